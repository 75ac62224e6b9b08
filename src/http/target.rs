use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::trace;

use crate::args::HttpMethod;
use crate::engine::{RequestDescriptor, TargetClient, TargetResponse};
use crate::error::TargetError;

/// Executes descriptors over a shared `reqwest::Client`. Any HTTP response
/// counts as a completed exchange; status and body checks are left to the
/// descriptor's assertions.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
}

impl HttpTarget {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

const fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_connect() {
        format!("connect error: {}", err)
    } else if err.is_redirect() {
        format!("redirect error: {}", err)
    } else if err.is_body() || err.is_decode() {
        format!("body error: {}", err)
    } else {
        err.to_string()
    }
}

#[async_trait]
impl TargetClient for HttpTarget {
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<TargetResponse, TargetError> {
        let mut request = self
            .client
            .request(to_method(descriptor.method()), descriptor.target());
        for (key, value) in descriptor.headers() {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = descriptor.body() {
            request = request.body(body.to_owned());
        }

        let response = request
            .send()
            .await
            .map_err(|err| TargetError::request(describe(&err)))?;
        let status = response.status().as_u16();
        // The body is always drained so the connection can be reused.
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TargetError::request(describe(&err)))?;
        trace!(
            "#{} {} -> {} ({} bytes)",
            descriptor.seq(),
            descriptor.target(),
            status,
            bytes.len()
        );

        let mut result = TargetResponse::success().with_status(status);
        if descriptor.needs_body() {
            result = result.with_body(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(result)
    }
}
