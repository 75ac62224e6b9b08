//! Load-generation engine: request source, executor pool, outcome channel,
//! aggregator, and the run controller tying them together.

mod aggregator;
mod channel;
mod controller;
mod descriptor;
mod outcome;
mod pool;
mod profile;
mod rate;
mod source;
mod target;

pub use aggregator::{
    Aggregator, LatencyHistogram, LatencySummary, OutcomeCounts, SnapshotHandle, StatsSnapshot,
    ThroughputWindow,
};
pub use channel::{OutcomeChannel, OutcomeReceiver, OutcomeSendError, OutcomeSender};
pub use controller::{DrainReason, RunController, RunHandle, RunReport, RunState};
pub use descriptor::{Assertion, RequestDescriptor, TargetResponse};
pub use outcome::{FailureCause, Outcome, OutcomeKind};
pub use pool::{PoolEvent, PoolSummary};
pub use profile::{
    DEFAULT_BACKPRESSURE_TIMEOUT, DEFAULT_BUFFER_PER_WORKER, DEFAULT_DRAIN_GRACE,
    DEFAULT_FAULT_BUDGET, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SNAPSHOT_INTERVAL,
    DEFAULT_THROUGHPUT_WINDOW_SECS, LoadMode, LoadProfile, LoadProfileBuilder,
    MAX_THROUGHPUT_WINDOW_SECS,
};
pub use source::{RequestSource, SourceItem};
pub use target::{ClientFactory, Scenario, SharedClient, TargetClient};
