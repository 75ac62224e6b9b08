use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::engine::{
    LoadProfile, RunController, RunReport, Scenario, SharedClient, TargetClient,
};
use crate::error::AppResult;
use crate::http::{HttpClientSettings, HttpTarget, build_client, preflight};
use crate::scenario::UrlListScenario;
use crate::shutdown_handlers::setup_signal_shutdown_handler;

use super::snapshots::spawn_snapshot_writer;
use super::summary;

/// Everything a local run needs, already validated.
pub(crate) struct LocalRun {
    pub profile: LoadProfile,
    pub scenario: UrlListScenario,
    pub http: HttpClientSettings,
    pub preflight: bool,
    pub snapshot_out: Option<PathBuf>,
}

/// Runs one load test against the configured HTTP targets and prints the
/// summary. A run that ends in `Failed` still yields its report.
pub(crate) async fn run_local(run: LocalRun) -> AppResult<RunReport> {
    let LocalRun {
        profile,
        scenario,
        http,
        preflight: preflight_enabled,
        snapshot_out,
    } = run;

    let client = build_client(&http)?;
    let target: Arc<dyn TargetClient> = Arc::new(HttpTarget::new(client));
    let scenario: Arc<dyn Scenario> = Arc::new(scenario);

    if preflight_enabled {
        preflight(target.as_ref(), scenario.as_ref(), profile.request_timeout()).await?;
    }

    let controller = RunController::new(profile, scenario, Arc::new(SharedClient::new(target)));
    let handle = controller.handle();
    let signal_handle = setup_signal_shutdown_handler(handle.clone());
    let snapshot_writer = snapshot_out
        .map(|path| spawn_snapshot_writer(path, handle.snapshots().subscribe()));
    drop(handle);

    let result = controller.run().await;
    signal_handle.abort();
    let report = result?;

    summary::print_summary(&report);

    if let Some(writer) = snapshot_writer {
        match writer.await? {
            Ok(lines) => info!("Snapshot output complete ({} lines)", lines),
            Err(err) => {
                error!("Snapshot output failed: {}", err);
                return Err(err.into());
            }
        }
    }

    Ok(report)
}
