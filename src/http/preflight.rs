use std::time::Duration;

use tracing::info;

use crate::engine::{Scenario, TargetClient};
use crate::error::HttpError;

/// Sends the scenario's first request once, outside the run, and checks it
/// against the same assertions the run would apply.
///
/// # Errors
///
/// Returns an error when the request cannot be built, fails, times out, or
/// does not pass its assertions.
pub async fn preflight(
    client: &dyn TargetClient,
    scenario: &dyn Scenario,
    timeout: Duration,
) -> Result<(), HttpError> {
    let descriptor = scenario
        .build_request(0)
        .map_err(|err| HttpError::PreflightScenario { source: err })?;
    let url = descriptor.target().to_owned();

    let response = match tokio::time::timeout(timeout, client.execute(&descriptor)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => return Err(HttpError::PreflightRequest { url, source: err }),
        Err(_elapsed) => return Err(HttpError::PreflightTimeout { url, timeout }),
    };

    if !response.success {
        return Err(HttpError::PreflightRejected {
            url,
            detail: "target reported failure".to_owned(),
        });
    }
    if let Some(detail) = descriptor
        .assertions()
        .iter()
        .find_map(|assertion| assertion.check(&response))
    {
        return Err(HttpError::PreflightRejected { url, detail });
    }

    info!("Preflight request to {} succeeded", url);
    Ok(())
}
