use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The client could not complete the request or reported failure.
    Target,
    /// The client answered but an assertion did not hold.
    Assertion,
    /// The scenario could not build the request.
    Scenario,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Failure(FailureCause),
    /// The per-request deadline elapsed first.
    Timeout,
    /// The request was abandoned because the run shut down.
    Cancelled,
}

impl OutcomeKind {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, OutcomeKind::Success)
    }

    /// Whether the elapsed time describes a completed exchange and belongs
    /// in the latency distribution.
    #[must_use]
    pub const fn has_latency(self) -> bool {
        matches!(self, OutcomeKind::Success | OutcomeKind::Failure(_))
    }
}

/// Recorded result of one request. Built by a worker, read-only afterwards.
#[derive(Debug, Clone)]
pub struct Outcome {
    seq: Option<u64>,
    worker: Option<usize>,
    timestamp: DateTime<Utc>,
    finished_at: Instant,
    elapsed: Duration,
    kind: OutcomeKind,
    status: Option<u16>,
    error: Option<String>,
    assertion_failure: Option<String>,
}

impl Outcome {
    #[must_use]
    pub fn new(kind: OutcomeKind, finished_at: Instant, elapsed: Duration) -> Self {
        Self {
            seq: None,
            worker: None,
            timestamp: Utc::now(),
            finished_at,
            elapsed,
            kind,
            status: None,
            error: None,
            assertion_failure: None,
        }
    }

    /// Builds an outcome for a request that started at `started` and ends now.
    #[must_use]
    pub fn finished(kind: OutcomeKind, started: Instant) -> Self {
        let now = Instant::now();
        Self::new(kind, now, now.saturating_duration_since(started))
    }

    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    #[must_use]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn with_assertion_failure(mut self, detail: impl Into<String>) -> Self {
        self.assertion_failure = Some(detail.into());
        self
    }

    #[must_use]
    pub const fn seq(&self) -> Option<u64> {
        self.seq
    }

    #[must_use]
    pub const fn worker(&self) -> Option<usize> {
        self.worker
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub const fn finished_at(&self) -> Instant {
        self.finished_at
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        self.kind
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn assertion_failure(&self) -> Option<&str> {
        self.assertion_failure.as_deref()
    }
}
