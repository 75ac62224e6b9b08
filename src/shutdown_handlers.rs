use tracing::warn;

use crate::engine::RunHandle;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Something that resolves once per shutdown request. `false` means the
/// source is gone and no further requests will arrive.
trait ShutdownSignals {
    async fn next(&mut self) -> bool;
}

struct ProcessSignals {
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl ProcessSignals {
    fn register() -> Self {
        #[cfg(unix)]
        let terminate = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                eprintln!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        Self {
            #[cfg(unix)]
            terminate,
        }
    }
}

impl ShutdownSignals for ProcessSignals {
    #[cfg(unix)]
    async fn next(&mut self) -> bool {
        let terminate = &mut self.terminate;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.is_ok(),
            () = async {
                if let Some(signal) = terminate.as_mut()
                    && signal.recv().await.is_some()
                {
                    return;
                }
                std::future::pending::<()>().await;
            } => true,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> bool {
        tokio::signal::ctrl_c().await.is_ok()
    }
}

/// Maps process signals onto the run: the first Ctrl+C or SIGTERM asks for
/// a graceful stop, the second cancels in-flight requests.
pub fn setup_signal_shutdown_handler(handle: RunHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = ProcessSignals::register();
        escalate(&handle, &mut signals).await;
    })
}

async fn escalate<S: ShutdownSignals>(handle: &RunHandle, signals: &mut S) {
    if !signals.next().await {
        return;
    }
    warn!("Shutdown requested; draining in-flight requests (signal again to cancel)");
    handle.stop();

    if !signals.next().await {
        return;
    }
    warn!("Second shutdown signal; cancelling in-flight requests");
    handle.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::HttpMethod;
    use crate::engine::{
        LoadProfile, RequestDescriptor, RunController, Scenario, SharedClient, TargetClient,
        TargetResponse,
    };
    use crate::error::{AppError, AppResult, ScenarioError, TargetError};
    use async_trait::async_trait;
    use std::future::Future;
    use std::sync::Arc;
    use std::time::Duration;

    const SHUTDOWN_HANDLER_TIMEOUT: Duration = Duration::from_secs(1);

    fn run_async_test<F>(future: F) -> AppResult<()>
    where
        F: Future<Output = AppResult<()>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
        runtime.block_on(future)
    }

    /// Delivers `remaining` signals, then reports the source as gone.
    struct Scripted {
        remaining: u32,
    }

    impl ShutdownSignals for Scripted {
        async fn next(&mut self) -> bool {
            match self.remaining.checked_sub(1) {
                Some(left) => {
                    self.remaining = left;
                    true
                }
                None => false,
            }
        }
    }

    struct Idle;

    impl Scenario for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        fn build_request(&self, seq: u64) -> Result<RequestDescriptor, ScenarioError> {
            Ok(RequestDescriptor::new(seq, HttpMethod::Get, "http://127.0.0.1/"))
        }
    }

    struct Immediate;

    #[async_trait]
    impl TargetClient for Immediate {
        async fn execute(
            &self,
            _descriptor: &RequestDescriptor,
        ) -> Result<TargetResponse, TargetError> {
            Ok(TargetResponse::success())
        }
    }

    fn handle() -> AppResult<RunHandle> {
        let profile = LoadProfile::builder(1)
            .request_cap(Some(1))
            .build()
            .map_err(AppError::config)?;
        let controller = RunController::new(
            profile,
            Arc::new(Idle),
            Arc::new(SharedClient::new(Arc::new(Immediate))),
        );
        Ok(controller.handle())
    }

    async fn escalate_with(remaining: u32) -> AppResult<RunHandle> {
        let handle = handle()?;
        let mut signals = Scripted { remaining };
        tokio::time::timeout(SHUTDOWN_HANDLER_TIMEOUT, escalate(&handle, &mut signals))
            .await
            .map_err(|err| {
                AppError::validation(format!("Timed out waiting for escalation: {}", err))
            })?;
        Ok(handle)
    }

    #[test]
    fn first_signal_stops_second_cancels() -> AppResult<()> {
        run_async_test(async {
            let observer = escalate_with(2).await?;
            if !observer.is_stop_requested() || !observer.is_cancel_requested() {
                return Err(AppError::validation("Both stop and cancel must be requested"));
            }
            Ok(())
        })
    }

    #[test]
    fn single_signal_only_stops() -> AppResult<()> {
        run_async_test(async {
            let observer = escalate_with(1).await?;
            if !observer.is_stop_requested() || observer.is_cancel_requested() {
                return Err(AppError::validation("One signal must stop without cancelling"));
            }
            Ok(())
        })
    }

    #[test]
    fn closed_signal_source_requests_nothing() -> AppResult<()> {
        run_async_test(async {
            let observer = escalate_with(0).await?;
            if observer.is_stop_requested() || observer.is_cancel_requested() {
                return Err(AppError::validation("No signal means no stop or cancel"));
            }
            Ok(())
        })
    }
}
