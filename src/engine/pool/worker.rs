use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::error::{ScenarioError, TargetError};

use super::super::channel::OutcomeSendError;
use super::super::descriptor::{RequestDescriptor, TargetResponse};
use super::super::outcome::{FailureCause, Outcome, OutcomeKind};
use super::super::source::SourceItem;
use super::{PoolContext, PoolEvent};

/// Why a worker returned.
#[derive(Debug)]
pub(crate) enum WorkerExit {
    EndOfStream,
    Stopped,
    /// The outcome channel failed; already reported as a fatal event.
    ChannelFault,
    /// The client handle is unusable.
    Fault(TargetError),
}

enum Execution {
    Completed(Result<TargetResponse, TargetError>),
    TimedOut,
    Cancelled,
}

pub(super) async fn run_worker(
    context: Arc<PoolContext>,
    worker_id: usize,
) -> (Option<usize>, WorkerExit) {
    let exit = drive(&context, worker_id).await;
    debug!(worker = worker_id, exit = ?exit, "Worker exited");
    (Some(worker_id), exit)
}

async fn drive(context: &PoolContext, worker_id: usize) -> WorkerExit {
    let client = match context.clients.connect(worker_id) {
        Ok(client) => client,
        Err(err) => return WorkerExit::Fault(err),
    };
    let slot = tokio::select! {
        biased;
        () = context.stop.cancelled() => return WorkerExit::Stopped,
        permit = Arc::clone(&context.slots).acquire_owned() => permit,
    };
    let Ok(_slot) = slot else {
        return WorkerExit::Stopped;
    };

    loop {
        let item = tokio::select! {
            biased;
            () = context.abort.cancelled() => return WorkerExit::Stopped,
            item = context.source.next() => item,
        };
        let descriptor = match item {
            Ok(SourceItem::Request(descriptor)) => descriptor,
            Ok(SourceItem::EndOfStream) => return WorkerExit::EndOfStream,
            Err(err) => {
                warn!(worker = worker_id, "Skipping request: {}", err);
                let outcome = scenario_failure(&err).with_worker(worker_id);
                if let Err(exit) = emit(context, outcome).await {
                    return exit;
                }
                continue;
            }
        };

        let started = Instant::now();
        let execution = tokio::select! {
            biased;
            () = context.abort.cancelled() => Execution::Cancelled,
            result = timeout(context.request_timeout, client.execute(&descriptor)) => match result {
                Ok(result) => Execution::Completed(result),
                Err(_elapsed) => Execution::TimedOut,
            },
        };
        let (outcome, fault) = classify(&descriptor, started, execution, context);
        if let Err(exit) = emit(context, outcome.with_worker(worker_id)).await {
            return exit;
        }
        if let Some(err) = fault {
            return WorkerExit::Fault(err);
        }
    }
}

fn scenario_failure(err: &ScenarioError) -> Outcome {
    let outcome = Outcome::new(
        OutcomeKind::Failure(FailureCause::Scenario),
        Instant::now(),
        Duration::ZERO,
    )
    .with_error(err.to_string());
    match err {
        ScenarioError::Build { seq, .. } => outcome.with_seq(*seq),
        ScenarioError::NoTargets => outcome,
    }
}

fn classify(
    descriptor: &RequestDescriptor,
    started: Instant,
    execution: Execution,
    context: &PoolContext,
) -> (Outcome, Option<TargetError>) {
    let seq = descriptor.seq();
    match execution {
        Execution::Cancelled => (
            Outcome::finished(OutcomeKind::Cancelled, started).with_seq(seq),
            None,
        ),
        Execution::TimedOut => (
            Outcome::finished(OutcomeKind::Timeout, started)
                .with_seq(seq)
                .with_error(format!(
                    "no response within {}ms",
                    context.request_timeout.as_millis()
                )),
            None,
        ),
        Execution::Completed(Err(err)) => {
            let outcome = Outcome::finished(OutcomeKind::Failure(FailureCause::Target), started)
                .with_seq(seq)
                .with_error(err.to_string());
            match err {
                TargetError::Fatal { .. } => (outcome, Some(err)),
                TargetError::Request { .. } => (outcome, None),
            }
        }
        Execution::Completed(Ok(response)) => {
            if !response.success {
                let outcome =
                    Outcome::finished(OutcomeKind::Failure(FailureCause::Target), started)
                        .with_seq(seq)
                        .with_status(response.status)
                        .with_error("target reported failure");
                return (outcome, None);
            }
            let mismatch = descriptor
                .assertions()
                .iter()
                .find_map(|assertion| assertion.check(&response));
            let outcome = match mismatch {
                Some(detail) => {
                    Outcome::finished(OutcomeKind::Failure(FailureCause::Assertion), started)
                        .with_assertion_failure(detail)
                }
                None => Outcome::finished(OutcomeKind::Success, started),
            };
            (outcome.with_seq(seq).with_status(response.status), None)
        }
    }
}

/// Hands the outcome to the aggregator. On backpressure the fault is reported
/// at once, then the outcome gets one more bounded attempt so it is not lost.
async fn emit(context: &PoolContext, outcome: Outcome) -> Result<(), WorkerExit> {
    match context.outcomes.send(outcome).await {
        Ok(()) => {
            context.source.record_completion();
            Ok(())
        }
        Err(err) => {
            let fault = err.fault(context.outcomes.backpressure_timeout());
            context.report(PoolEvent::Fatal(fault));
            if let OutcomeSendError::Backpressure(outcome) = err
                && context
                    .outcomes
                    .send_within(*outcome, context.drain_grace)
                    .await
                    .is_ok()
            {
                context.source.record_completion();
            }
            Err(WorkerExit::ChannelFault)
        }
    }
}
