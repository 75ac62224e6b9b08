use std::time::Duration;

use reqwest::{Client, redirect};

use crate::args::DEFAULT_USER_AGENT;
use crate::error::HttpError;

/// Connection-level settings. The per-request deadline is enforced by the
/// engine, so the client itself carries no total timeout.
#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    pub connect_timeout: Duration,
    pub insecure: bool,
    pub redirect_limit: usize,
    /// Idle connections kept per host; sized to the worker count.
    pub pool_size: usize,
}

/// Builds the shared client used by every worker.
///
/// # Errors
///
/// Returns an error when the TLS backend or client cannot be initialized.
pub fn build_client(settings: &HttpClientSettings) -> Result<Client, HttpError> {
    let mut client_builder = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .pool_max_idle_per_host(settings.pool_size);

    if settings.redirect_limit == 0 {
        client_builder = client_builder.redirect(redirect::Policy::none());
    } else {
        client_builder =
            client_builder.redirect(redirect::Policy::limited(settings.redirect_limit));
    }

    if settings.insecure {
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    client_builder
        .build()
        .map_err(|err| HttpError::BuildClientFailed { source: err })
}
