use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError};

use crate::error::RunFault;

use super::outcome::Outcome;

/// Why an outcome could not be handed to the aggregator. The outcome is
/// returned so the caller can retry or account for it.
#[derive(Debug)]
pub enum OutcomeSendError {
    Backpressure(Box<Outcome>),
    Closed(Box<Outcome>),
}

impl OutcomeSendError {
    #[must_use]
    pub fn fault(&self, timeout: Duration) -> RunFault {
        match self {
            OutcomeSendError::Backpressure(_) => RunFault::BackpressureExceeded { timeout },
            OutcomeSendError::Closed(_) => RunFault::OutcomeChannelClosed,
        }
    }
}

/// Producer half held by every worker.
#[derive(Debug, Clone)]
pub struct OutcomeSender {
    tx: mpsc::Sender<Outcome>,
    backpressure_timeout: Duration,
}

impl OutcomeSender {
    /// Waits up to the backpressure timeout for buffer space.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeSendError::Backpressure`] when the buffer stayed full
    /// for the whole timeout and [`OutcomeSendError::Closed`] when the
    /// aggregator is gone.
    pub async fn send(&self, outcome: Outcome) -> Result<(), OutcomeSendError> {
        self.send_within(outcome, self.backpressure_timeout).await
    }

    /// Like [`OutcomeSender::send`] with an explicit bound.
    ///
    /// # Errors
    ///
    /// Same as [`OutcomeSender::send`].
    pub async fn send_within(
        &self,
        outcome: Outcome,
        timeout: Duration,
    ) -> Result<(), OutcomeSendError> {
        match self.tx.send_timeout(outcome, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(outcome)) => {
                Err(OutcomeSendError::Backpressure(Box::new(outcome)))
            }
            Err(SendTimeoutError::Closed(outcome)) => {
                Err(OutcomeSendError::Closed(Box::new(outcome)))
            }
        }
    }

    #[must_use]
    pub const fn backpressure_timeout(&self) -> Duration {
        self.backpressure_timeout
    }
}

/// Consumer half, owned by the aggregator task.
#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: mpsc::Receiver<Outcome>,
}

impl OutcomeReceiver {
    /// Next outcome, or `None` once every sender is gone and the buffer is
    /// empty.
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.rx.recv().await
    }
}

/// Bounded multi-producer channel from the executor pool to the aggregator.
///
/// The run controller keeps one sender for cloning into the pool and drops it
/// with [`OutcomeChannel::close`]; the receiver then ends once every worker's
/// clone is gone too.
#[derive(Debug)]
pub struct OutcomeChannel {
    sender: Option<OutcomeSender>,
}

impl OutcomeChannel {
    #[must_use]
    pub fn bounded(capacity: usize, backpressure_timeout: Duration) -> (Self, OutcomeReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sender = OutcomeSender {
            tx,
            backpressure_timeout,
        };
        (
            Self {
                sender: Some(sender),
            },
            OutcomeReceiver { rx },
        )
    }

    /// A new producer handle, or `None` after the channel was closed.
    #[must_use]
    pub fn sender(&self) -> Option<OutcomeSender> {
        self.sender.clone()
    }

    /// Drops the controller's sender. Calling it again is a no-op.
    pub fn close(&mut self) {
        drop(self.sender.take());
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}
