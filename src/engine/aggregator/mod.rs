mod histogram;
mod snapshot;
mod window;


use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::error::EngineError;

use super::channel::OutcomeReceiver;
use super::outcome::{FailureCause, Outcome, OutcomeKind};

pub use histogram::LatencyHistogram;
pub use snapshot::{LatencySummary, OutcomeCounts, StatsSnapshot};
pub use window::ThroughputWindow;

/// Pending on-demand snapshot request.
pub(crate) type SnapshotRequest = oneshot::Sender<StatsSnapshot>;

/// Running statistics over every ingested outcome. Memory is fixed: two
/// bounded histograms, one ring of per-second buckets, and the status map.
#[derive(Debug, Clone)]
pub struct Aggregator {
    started: Instant,
    counts: OutcomeCounts,
    latency: LatencyHistogram,
    success_latency: LatencyHistogram,
    window: ThroughputWindow,
    status_counts: BTreeMap<u16, u64>,
    last_error: Option<String>,
}

impl Aggregator {
    /// # Errors
    ///
    /// Returns an error if the latency histograms cannot be allocated.
    pub fn new(started: Instant, window_secs: u64) -> Result<Self, EngineError> {
        Ok(Self {
            started,
            counts: OutcomeCounts::default(),
            latency: LatencyHistogram::new()?,
            success_latency: LatencyHistogram::new()?,
            window: ThroughputWindow::new(started, window_secs),
            status_counts: BTreeMap::new(),
            last_error: None,
        })
    }

    /// Folds one outcome into the running statistics. The result does not
    /// depend on the order outcomes arrive in.
    pub fn ingest(&mut self, outcome: &Outcome) {
        let counts = &mut self.counts;
        counts.total = counts.total.saturating_add(1);
        match outcome.kind() {
            OutcomeKind::Success => counts.success = counts.success.saturating_add(1),
            OutcomeKind::Failure(cause) => {
                counts.failure = counts.failure.saturating_add(1);
                match cause {
                    FailureCause::Target => {
                        counts.target_failures = counts.target_failures.saturating_add(1);
                    }
                    FailureCause::Assertion => {
                        counts.assertion_failures = counts.assertion_failures.saturating_add(1);
                    }
                    FailureCause::Scenario => {
                        counts.scenario_failures = counts.scenario_failures.saturating_add(1);
                    }
                }
            }
            OutcomeKind::Timeout => counts.timeouts = counts.timeouts.saturating_add(1),
            OutcomeKind::Cancelled => counts.cancelled = counts.cancelled.saturating_add(1),
        }

        let kind = outcome.kind();
        if kind.has_latency() {
            self.latency.record(outcome.elapsed());
        }
        if kind.is_success() {
            self.success_latency.record(outcome.elapsed());
        }
        self.window.record(outcome.finished_at());
        if let Some(status) = outcome.status() {
            let entry = self.status_counts.entry(status).or_insert(0);
            *entry = entry.saturating_add(1);
        }
        if let Some(detail) = outcome.error().or_else(|| outcome.assertion_failure()) {
            debug!(
                seq = outcome.seq(),
                worker = outcome.worker(),
                at = %outcome.timestamp(),
                detail,
                "Request failed"
            );
            self.last_error = Some(detail.to_owned());
        }
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> StatsSnapshot {
        let elapsed = now.saturating_duration_since(self.started);
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let mean_rps = self
            .counts
            .total
            .saturating_mul(1_000)
            .checked_div(elapsed_ms.max(1))
            .unwrap_or(0);
        let errors = self.counts.errors();
        let error_rate_bp = errors
            .saturating_mul(10_000)
            .checked_div(self.counts.total)
            .unwrap_or(0);
        StatsSnapshot {
            taken_at: Utc::now(),
            elapsed_ms,
            counts: self.counts,
            latency: self.latency.summary(),
            success_latency: self.success_latency.summary(),
            window_secs: self.window.window_secs(),
            window_rps: self.window.rate_per_sec(now),
            mean_rps,
            error_rate_bp,
            status_counts: self.status_counts.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Sole consumer of the outcome channel. Snapshots are built inside the task,
/// so readers never see a partially applied outcome.
pub(crate) struct AggregatorTask {
    aggregator: Aggregator,
    outcomes: OutcomeReceiver,
    requests: mpsc::Receiver<SnapshotRequest>,
    publish: watch::Sender<Arc<StatsSnapshot>>,
    publish_interval: Duration,
    #[cfg(test)]
    ingest_delay: Duration,
}

impl AggregatorTask {
    pub(crate) const fn new(
        aggregator: Aggregator,
        outcomes: OutcomeReceiver,
        requests: mpsc::Receiver<SnapshotRequest>,
        publish: watch::Sender<Arc<StatsSnapshot>>,
        publish_interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            outcomes,
            requests,
            publish,
            publish_interval,
            #[cfg(test)]
            ingest_delay: Duration::ZERO,
        }
    }

    /// Makes the task sleep after every ingest, simulating a consumer that
    /// cannot keep up.
    #[cfg(test)]
    pub(crate) const fn with_ingest_delay(mut self, delay: Duration) -> Self {
        self.ingest_delay = delay;
        self
    }

    /// Runs until every outcome sender is gone, then returns the final
    /// snapshot.
    pub(crate) fn spawn(self) -> JoinHandle<StatsSnapshot> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> StatsSnapshot {
        #[cfg(test)]
        let ingest_delay = self.ingest_delay;
        let AggregatorTask {
            mut aggregator,
            mut outcomes,
            mut requests,
            publish,
            publish_interval,
            ..
        } = self;
        let mut publish_tick = interval(publish_interval);
        publish_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        publish_tick.tick().await;

        loop {
            tokio::select! {
                maybe_outcome = outcomes.recv() => {
                    let Some(outcome) = maybe_outcome else {
                        break;
                    };
                    aggregator.ingest(&outcome);
                    #[cfg(test)]
                    if !ingest_delay.is_zero() {
                        tokio::time::sleep(ingest_delay).await;
                    }
                }
                Some(reply) = requests.recv() => {
                    drop(reply.send(aggregator.snapshot(Instant::now())));
                }
                _ = publish_tick.tick() => {
                    let snapshot = aggregator.snapshot(Instant::now());
                    info!(
                        total = snapshot.total(),
                        success = snapshot.counts.success,
                        errors = snapshot.errors(),
                        rps = snapshot.window_rps,
                        p50_us = snapshot.latency.p50_us,
                        p99_us = snapshot.latency.p99_us,
                        "progress"
                    );
                    publish.send_replace(Arc::new(snapshot));
                }
            }
        }

        let last = aggregator.snapshot(Instant::now());
        debug!(total = last.counts.total, "Outcome channel drained");
        publish.send_replace(Arc::new(last.clone()));
        last
    }
}

/// Read access to the aggregator from outside the run.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    requests: mpsc::Sender<SnapshotRequest>,
    latest: watch::Receiver<Arc<StatsSnapshot>>,
}

impl SnapshotHandle {
    pub(crate) const fn new(
        requests: mpsc::Sender<SnapshotRequest>,
        latest: watch::Receiver<Arc<StatsSnapshot>>,
    ) -> Self {
        Self { requests, latest }
    }

    /// Asks the running aggregator for a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AggregatorGone`] when no aggregator is running.
    pub async fn snapshot(&self) -> Result<StatsSnapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.requests.send(reply_tx).await.is_err() {
            return Err(EngineError::AggregatorGone);
        }
        reply_rx.await.ok().ok_or(EngineError::AggregatorGone)
    }

    /// Most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> Arc<StatsSnapshot> {
        Arc::clone(&self.latest.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatsSnapshot>> {
        self.latest.clone()
    }
}
