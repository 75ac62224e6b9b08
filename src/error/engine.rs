use std::time::Duration;

use thiserror::Error;

use crate::engine::RunState;

/// Request construction failed; fatal to one iteration, never to the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Scenario has no targets.")]
    NoTargets,
    #[error("Failed to build request #{seq}: {message}")]
    Build { seq: u64, message: String },
}

/// Errors reported by a target client.
///
/// `Request` is an ordinary per-request failure and becomes a failed outcome.
/// `Fatal` means the client handle itself is unusable; the worker owning it
/// stops and the pool decides whether to replace it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Request failed: {message}")]
    Request { message: String },
    #[error("Target client fault: {message}")]
    Fatal { message: String },
}

impl TargetError {
    pub fn request(message: impl Into<String>) -> Self {
        TargetError::Request {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        TargetError::Fatal {
            message: message.into(),
        }
    }
}

/// Reason a run ended in `Failed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunFault {
    #[error("Outcome send blocked for more than {timeout:?}; the aggregator is not keeping up.")]
    BackpressureExceeded { timeout: Duration },
    #[error("Executor faults exceeded the budget of {budget} (last: {last}).")]
    ExecutorFaults { budget: usize, last: String },
    #[error("Run was cancelled before it started.")]
    CancelledBeforeStart,
    #[error("Outcome channel closed while workers were still running.")]
    OutcomeChannelClosed,
    #[error("Executor pool task failed: {message}")]
    PoolFailed { message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid run state transition {from} -> {to}.")]
    InvalidTransition { from: RunState, to: RunState },
    #[error("Failed to create latency histogram: {source}")]
    HistogramCreation {
        #[source]
        source: hdrhistogram::CreationError,
    },
    #[error("Aggregator task is no longer running.")]
    AggregatorGone,
    #[error("Aggregator task failed: {source}")]
    AggregatorJoin {
        #[source]
        source: tokio::task::JoinError,
    },
    #[error(transparent)]
    Fault(#[from] RunFault),
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
