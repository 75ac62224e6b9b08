mod ramp;
mod state;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::time::{Instant, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{EngineError, RunFault};

use super::aggregator::{Aggregator, AggregatorTask, SnapshotHandle, SnapshotRequest, StatsSnapshot};
use super::channel::OutcomeChannel;
use super::pool::{ExecutorPool, PoolContext, PoolEvent, PoolSummary};
use super::profile::{LoadMode, LoadProfile};
use super::rate::{RateController, spawn_rate_pacer};
use super::source::RequestSource;
use super::target::{ClientFactory, Scenario};
use ramp::{ConcurrencyRamp, RAMP_TICK};

pub use state::RunState;
use state::StateCell;

const SNAPSHOT_REQUEST_BUFFER: usize = 16;

/// Why a run entered `Draining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    DurationElapsed,
    RequestCapReached,
    WorkersExited,
    StopRequested,
    Cancelled,
}

impl DrainReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DrainReason::DurationElapsed => "duration elapsed",
            DrainReason::RequestCapReached => "request cap reached",
            DrainReason::WorkersExited => "workers exited",
            DrainReason::StopRequested => "stop requested",
            DrainReason::Cancelled => "cancelled",
        }
    }
}

/// Final account of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub fault: Option<RunFault>,
    pub drain_reason: Option<DrainReason>,
    pub snapshot: StatsSnapshot,
    pub transitions: Vec<RunState>,
    pub pool: PoolSummary,
    pub issued: u64,
}

impl RunReport {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.state, RunState::Failed)
    }
}

/// Control surface for a run, usable from any task.
#[derive(Debug, Clone)]
pub struct RunHandle {
    stop: CancellationToken,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    snapshots: SnapshotHandle,
}

impl RunHandle {
    /// Stop issuing new requests and let in-flight ones finish within the
    /// drain grace.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Abandon in-flight requests immediately. Before the run starts this
    /// makes it fail.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }
}

enum LoopExit {
    Drain(DrainReason),
    Fail(RunFault),
}

enum PoolWait {
    Finished,
    TimedOut,
}

/// Owns one run from `Pending` to `Stopped` or `Failed`.
pub struct RunController {
    profile: LoadProfile,
    scenario: Arc<dyn Scenario>,
    clients: Arc<dyn ClientFactory>,
    state: StateCell,
    stop_requested: CancellationToken,
    cancel_requested: CancellationToken,
    snapshot_tx: watch::Sender<Arc<StatsSnapshot>>,
    snapshot_requests_tx: mpsc::Sender<SnapshotRequest>,
    snapshot_requests_rx: mpsc::Receiver<SnapshotRequest>,
    #[cfg(test)]
    ingest_delay: Duration,
}

impl RunController {
    #[must_use]
    pub fn new(
        profile: LoadProfile,
        scenario: Arc<dyn Scenario>,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        let (snapshot_tx, _snapshot_rx) = watch::channel(Arc::new(StatsSnapshot::default()));
        let (snapshot_requests_tx, snapshot_requests_rx) = mpsc::channel(SNAPSHOT_REQUEST_BUFFER);
        Self {
            profile,
            scenario,
            clients,
            state: StateCell::new(),
            stop_requested: CancellationToken::new(),
            cancel_requested: CancellationToken::new(),
            snapshot_tx,
            snapshot_requests_tx,
            snapshot_requests_rx,
            #[cfg(test)]
            ingest_delay: Duration::ZERO,
        }
    }

    /// Ties the run to an external cancellation token, e.g. one shared with
    /// other work. Cancelling it behaves like [`RunHandle::cancel`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_requested = token;
        self
    }

    #[cfg(test)]
    pub(crate) const fn with_ingest_delay(mut self, delay: Duration) -> Self {
        self.ingest_delay = delay;
        self
    }

    #[must_use]
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            stop: self.stop_requested.clone(),
            cancel: self.cancel_requested.clone(),
            state: self.state.subscribe(),
            snapshots: SnapshotHandle::new(
                self.snapshot_requests_tx.clone(),
                self.snapshot_tx.subscribe(),
            ),
        }
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state.current()
    }

    /// Drives the run to a terminal state.
    ///
    /// Engine faults such as backpressure or exhausted worker replacements end
    /// in a report with state `Failed`; they are not returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error when the run cannot be set up or its bookkeeping
    /// breaks (histogram allocation, an illegal state transition, a panicked
    /// aggregator).
    pub async fn run(self) -> Result<RunReport, EngineError> {
        #[cfg(test)]
        let ingest_delay = self.ingest_delay;
        let RunController {
            profile,
            scenario,
            clients,
            mut state,
            stop_requested,
            cancel_requested,
            snapshot_tx,
            snapshot_requests_rx,
            ..
        } = self;

        if cancel_requested.is_cancelled() {
            warn!("Run cancelled before it started");
            state.transition(RunState::Failed)?;
            return Ok(RunReport {
                state: state.current(),
                fault: Some(RunFault::CancelledBeforeStart),
                drain_reason: None,
                snapshot: StatsSnapshot::default(),
                transitions: state.history().to_vec(),
                pool: PoolSummary::default(),
                issued: 0,
            });
        }

        let started = Instant::now();
        info!(
            scenario = scenario.name(),
            mode = profile.mode().as_str(),
            concurrency = profile.concurrency(),
            buffer = profile.buffer_size(),
            "Starting run"
        );

        let (mut channel, receiver) =
            OutcomeChannel::bounded(profile.buffer_size(), profile.backpressure_timeout());
        let aggregator_task = AggregatorTask::new(
            Aggregator::new(started, profile.throughput_window_secs())?,
            receiver,
            snapshot_requests_rx,
            snapshot_tx,
            profile.snapshot_interval(),
        );
        #[cfg(test)]
        let aggregator_task = aggregator_task.with_ingest_delay(ingest_delay);
        let aggregator_task = aggregator_task.spawn();

        let issue_stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let mut source = RequestSource::new(scenario, profile.request_cap(), issue_stop.clone());
        let mut pacer = None;
        let gate_ramp = match profile.mode() {
            LoadMode::Concurrency => profile.ramp(),
            LoadMode::Rate { per_second } => {
                let limiter = Arc::new(Semaphore::new(0));
                source = source.with_rate_limiter(Arc::clone(&limiter));
                pacer = Some((limiter, RateController::new(per_second, profile.ramp())));
                Duration::ZERO
            }
            LoadMode::Rounds { size, interval } => {
                source = source.with_rounds(size, interval);
                profile.ramp()
            }
        };
        let source = Arc::new(source);

        let outcomes = channel
            .sender()
            .ok_or(EngineError::Fault(RunFault::OutcomeChannelClosed))?;
        let slots = Arc::new(Semaphore::new(0));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let context = Arc::new(PoolContext {
            source: Arc::clone(&source),
            clients,
            slots: Arc::clone(&slots),
            outcomes,
            events: events_tx,
            stop: issue_stop.clone(),
            abort: abort.clone(),
            request_timeout: profile.request_timeout(),
            drain_grace: profile.drain_grace(),
        });
        let pool_task =
            ExecutorPool::new(context, profile.concurrency(), profile.fault_budget()).spawn();

        let mut ramp = ConcurrencyRamp::new(profile.concurrency(), gate_ramp);
        let ramping = !profile.ramp().is_zero();
        state.transition(if ramping {
            RunState::RampingUp
        } else {
            RunState::Steady
        })?;
        slots.add_permits(ramp.advance(Duration::ZERO));
        let pacer_task = pacer.map(|(limiter, controller)| {
            spawn_rate_pacer(limiter, controller, issue_stop.clone())
        });

        let ramp_end = sleep_until(started.checked_add(profile.ramp()).unwrap_or(started));
        tokio::pin!(ramp_end);
        let deadline = profile
            .total_duration()
            .and_then(|total| started.checked_add(total));
        let run_end = sleep_until(deadline.unwrap_or(started));
        tokio::pin!(run_end);
        let mut ramp_tick = interval(RAMP_TICK);
        let mut pool_finished = false;

        let exit = loop {
            let ramping_now = state.current() == RunState::RampingUp;
            tokio::select! {
                biased;
                () = cancel_requested.cancelled() => break LoopExit::Drain(DrainReason::Cancelled),
                event = events_rx.recv() => match event {
                    Some(PoolEvent::Fatal(fault)) => break LoopExit::Fail(fault),
                    Some(PoolEvent::WorkerFault { .. }) => {}
                    Some(PoolEvent::Finished) | None => {
                        pool_finished = true;
                        let reason = if source.cap_reached() {
                            DrainReason::RequestCapReached
                        } else {
                            DrainReason::WorkersExited
                        };
                        break LoopExit::Drain(reason);
                    }
                },
                () = stop_requested.cancelled() => break LoopExit::Drain(DrainReason::StopRequested),
                () = &mut run_end, if deadline.is_some() => break LoopExit::Drain(DrainReason::DurationElapsed),
                () = &mut ramp_end, if ramping_now => {
                    state.transition(RunState::Steady)?;
                    slots.add_permits(ramp.finish());
                }
                _ = ramp_tick.tick(), if ramping_now => {
                    slots.add_permits(ramp.advance(started.elapsed()));
                }
            }
        };

        let mut fault = None;
        let mut drain_reason = None;
        match exit {
            LoopExit::Fail(run_fault) => {
                error!("Run failed: {}", run_fault);
                state.transition(RunState::Failed)?;
                issue_stop.cancel();
                abort.cancel();
                fault = Some(run_fault);
            }
            LoopExit::Drain(reason) => {
                state.transition(RunState::Draining)?;
                info!(reason = reason.as_str(), "Draining");
                issue_stop.cancel();
                if reason == DrainReason::Cancelled {
                    abort.cancel();
                }
                drain_reason = Some(reason);
            }
        }

        if !pool_finished {
            let grace_end = Instant::now()
                .checked_add(profile.drain_grace())
                .unwrap_or_else(Instant::now);
            let waited =
                wait_for_pool(&mut events_rx, grace_end, &cancel_requested, &abort, &mut fault)
                    .await;
            if matches!(waited, PoolWait::TimedOut) {
                if !abort.is_cancelled() {
                    warn!(
                        "Drain grace of {}ms elapsed; cancelling in-flight requests",
                        profile.drain_grace().as_millis()
                    );
                    abort.cancel();
                }
                let hard_end = Instant::now()
                    .checked_add(
                        profile
                            .backpressure_timeout()
                            .saturating_add(profile.drain_grace()),
                    )
                    .unwrap_or_else(Instant::now);
                let waited =
                    wait_for_pool(&mut events_rx, hard_end, &cancel_requested, &abort, &mut fault)
                        .await;
                if matches!(waited, PoolWait::TimedOut) {
                    error!("Workers did not exit after cancellation; aborting executor pool");
                    pool_task.abort();
                }
            }
        }

        let pool = match pool_task.await {
            Ok(summary) => summary,
            Err(err) if err.is_cancelled() => PoolSummary::default(),
            Err(err) => {
                error!("Executor pool task failed: {}", err);
                if fault.is_none() {
                    fault = Some(RunFault::PoolFailed {
                        message: err.to_string(),
                    });
                }
                PoolSummary::default()
            }
        };
        if let Some(pacer_task) = pacer_task
            && let Err(err) = pacer_task.await
        {
            warn!("Rate pacer task failed: {}", err);
        }

        channel.close();
        let snapshot = aggregator_task
            .await
            .map_err(|source| EngineError::AggregatorJoin { source })?;

        if fault.is_some() {
            if state.current() != RunState::Failed {
                state.transition(RunState::Failed)?;
            }
        } else {
            state.transition(RunState::Stopped)?;
        }
        info!(
            state = %state.current(),
            total = snapshot.counts.total,
            issued = source.issued(),
            elapsed_ms = snapshot.elapsed_ms,
            "Run finished"
        );

        Ok(RunReport {
            state: state.current(),
            fault,
            drain_reason,
            snapshot,
            transitions: state.history().to_vec(),
            pool,
            issued: source.issued(),
        })
    }
}

/// Waits for the pool to report that every worker exited, recording fatal
/// events on the way. A cancel request during the wait abandons in-flight
/// requests at once.
async fn wait_for_pool(
    events: &mut mpsc::UnboundedReceiver<PoolEvent>,
    deadline: Instant,
    cancel: &CancellationToken,
    abort: &CancellationToken,
    fault: &mut Option<RunFault>,
) -> PoolWait {
    let expiry = sleep_until(deadline);
    tokio::pin!(expiry);
    loop {
        let aborted = abort.is_cancelled();
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(PoolEvent::Fatal(run_fault)) => {
                    if fault.is_none() {
                        error!("Run failed while draining: {}", run_fault);
                        *fault = Some(run_fault);
                    }
                    abort.cancel();
                }
                Some(PoolEvent::WorkerFault { .. }) => {}
                Some(PoolEvent::Finished) | None => return PoolWait::Finished,
            },
            () = cancel.cancelled(), if !aborted => {
                info!("Cancel requested while draining; abandoning in-flight requests");
                abort.cancel();
            }
            () = &mut expiry => return PoolWait::TimedOut,
        }
    }
}
