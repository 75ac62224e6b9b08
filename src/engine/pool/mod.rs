mod worker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{RunFault, TargetError};

use super::channel::OutcomeSender;
use super::source::RequestSource;
use super::target::ClientFactory;

pub(crate) use worker::WorkerExit;

/// Notifications from the pool to the run controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A worker stopped on a fatal client error. `replaced` tells whether a
    /// fresh worker took its slot.
    WorkerFault {
        worker: usize,
        error: TargetError,
        replaced: bool,
    },
    /// The run cannot continue.
    Fatal(RunFault),
    /// Every worker has exited.
    Finished,
}

/// Everything a worker needs. Shared read-only through an `Arc`; the outcome
/// channel stays open for as long as any clone is alive.
pub(crate) struct PoolContext {
    pub(crate) source: Arc<RequestSource>,
    pub(crate) clients: Arc<dyn ClientFactory>,
    pub(crate) slots: Arc<Semaphore>,
    pub(crate) outcomes: OutcomeSender,
    pub(crate) events: mpsc::UnboundedSender<PoolEvent>,
    pub(crate) stop: CancellationToken,
    pub(crate) abort: CancellationToken,
    pub(crate) request_timeout: Duration,
    pub(crate) drain_grace: Duration,
}

impl PoolContext {
    pub(crate) fn report(&self, event: PoolEvent) {
        drop(self.events.send(event));
    }
}

/// Fixed-size set of workers pulling from one request source.
///
/// Workers only start issuing once they hold a slot permit, so the controller
/// widens concurrency by adding permits. A worker that exits on a fault is
/// replaced until `fault_budget` is used up.
pub struct ExecutorPool {
    context: Arc<PoolContext>,
    concurrency: usize,
    fault_budget: usize,
}

impl ExecutorPool {
    pub(crate) const fn new(context: Arc<PoolContext>, concurrency: usize, fault_budget: usize) -> Self {
        Self {
            context,
            concurrency,
            fault_budget,
        }
    }

    /// Spawns the supervisor. The returned handle resolves after every worker
    /// has exited and the pool has dropped its outcome sender.
    pub(crate) fn spawn(self) -> JoinHandle<PoolSummary> {
        tokio::spawn(self.supervise())
    }

    async fn supervise(self) -> PoolSummary {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            workers.spawn(worker::run_worker(Arc::clone(&self.context), worker_id));
        }
        let mut next_id = self.concurrency;
        let mut summary = PoolSummary::default();

        while let Some(joined) = workers.join_next().await {
            let (worker_id, exit) = match joined {
                Ok(result) => result,
                Err(err) => {
                    error!("Worker task failed: {}", err);
                    (None, WorkerExit::Fault(TargetError::fatal(err.to_string())))
                }
            };
            match exit {
                WorkerExit::EndOfStream | WorkerExit::Stopped | WorkerExit::ChannelFault => {
                    summary.exited = summary.exited.saturating_add(1);
                }
                WorkerExit::Fault(err) => {
                    summary.exited = summary.exited.saturating_add(1);
                    summary.faults = summary.faults.saturating_add(1);
                    let over_budget = summary.faults > self.fault_budget;
                    let replace = !over_budget && !self.context.stop.is_cancelled();
                    warn!(
                        worker = worker_id.unwrap_or(usize::MAX),
                        faults = summary.faults,
                        replace,
                        "Worker fault: {}",
                        err
                    );
                    self.context.report(PoolEvent::WorkerFault {
                        worker: worker_id.unwrap_or(usize::MAX),
                        error: err.clone(),
                        replaced: replace,
                    });
                    if over_budget {
                        self.context.report(PoolEvent::Fatal(RunFault::ExecutorFaults {
                            budget: self.fault_budget,
                            last: err.to_string(),
                        }));
                    } else if replace {
                        workers.spawn(worker::run_worker(Arc::clone(&self.context), next_id));
                        next_id = next_id.saturating_add(1);
                        summary.replaced = summary.replaced.saturating_add(1);
                    }
                }
            }
        }

        debug!(
            exited = summary.exited,
            faults = summary.faults,
            "All workers exited"
        );
        self.context.report(PoolEvent::Finished);
        summary
    }
}

/// Worker bookkeeping returned when the pool winds down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub exited: usize,
    pub faults: usize,
    pub replaced: usize,
}
