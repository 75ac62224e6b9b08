use crate::app::{LocalRun, run_local};
use crate::error::{AppError, AppResult};

/// Runs the plan. A run that ended in `Failed` becomes an error so the
/// process exits non-zero.
pub(crate) async fn execute_plan(plan: LocalRun) -> AppResult<()> {
    let report = run_local(plan).await?;
    let failed = report.is_failed();
    match report.fault {
        Some(fault) if failed => Err(AppError::engine(fault)),
        Some(_) | None => Ok(()),
    }
}
