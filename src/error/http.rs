use std::time::Duration;

use thiserror::Error;

use super::{ScenarioError, TargetError};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
    #[error("Preflight request to '{url}' failed: {source}")]
    PreflightRequest {
        url: String,
        #[source]
        source: TargetError,
    },
    #[error("Preflight request to '{url}' was rejected: {detail}")]
    PreflightRejected { url: String, detail: String },
    #[error("Preflight request to '{url}' got no response within {timeout:?}.")]
    PreflightTimeout { url: String, timeout: Duration },
    #[error("Preflight request could not be built: {source}")]
    PreflightScenario {
        #[source]
        source: ScenarioError,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
