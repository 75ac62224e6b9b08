use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::EngineError;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    RampingUp,
    Steady,
    Draining,
    Stopped,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::RampingUp => "ramping_up",
            RunState::Steady => "steady",
            RunState::Draining => "draining",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Pending, RunState::RampingUp | RunState::Steady)
                | (RunState::RampingUp, RunState::Steady | RunState::Draining)
                | (RunState::Steady, RunState::Draining)
                | (RunState::Draining, RunState::Stopped)
                | (
                    RunState::Pending
                        | RunState::RampingUp
                        | RunState::Steady
                        | RunState::Draining,
                    RunState::Failed
                )
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus its broadcast. Every accepted transition is published
/// before the caller acts on it.
#[derive(Debug)]
pub(crate) struct StateCell {
    current: RunState,
    history: Vec<RunState>,
    tx: watch::Sender<RunState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Pending);
        Self {
            current: RunState::Pending,
            history: vec![RunState::Pending],
            tx,
        }
    }

    pub(crate) const fn current(&self) -> RunState {
        self.current
    }

    pub(crate) fn history(&self) -> &[RunState] {
        &self.history
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }

    pub(crate) fn transition(&mut self, next: RunState) -> Result<(), EngineError> {
        if !self.current.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        info!("Run state {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
        self.tx.send_replace(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_accepted() -> Result<(), EngineError> {
        let mut cell = StateCell::new();
        let rx = cell.subscribe();
        for next in [
            RunState::RampingUp,
            RunState::Steady,
            RunState::Draining,
            RunState::Stopped,
        ] {
            cell.transition(next)?;
            if *rx.borrow() != next {
                return Err(EngineError::from(format!("watch lagged at {}", next)));
            }
        }
        if cell.history().len() != 5 || !cell.current().is_terminal() {
            return Err(EngineError::from("Unexpected history"));
        }
        Ok(())
    }

    #[test]
    fn terminal_states_reject_everything() -> Result<(), EngineError> {
        let all = [
            RunState::Pending,
            RunState::RampingUp,
            RunState::Steady,
            RunState::Draining,
            RunState::Stopped,
            RunState::Failed,
        ];
        for terminal in [RunState::Stopped, RunState::Failed] {
            for next in all {
                if terminal.can_transition_to(next) {
                    return Err(EngineError::from(format!("{} -> {} accepted", terminal, next)));
                }
            }
        }
        Ok(())
    }

    #[test]
    fn skipping_drain_is_rejected() -> Result<(), EngineError> {
        let mut cell = StateCell::new();
        cell.transition(RunState::Steady)?;
        match cell.transition(RunState::Stopped) {
            Err(EngineError::InvalidTransition { from, to })
                if from == RunState::Steady && to == RunState::Stopped => {}
            other => {
                return Err(EngineError::from(format!("Unexpected result: {:?}", other)));
            }
        }
        if cell.current() != RunState::Steady {
            return Err(EngineError::from("Rejected transition changed state"));
        }
        cell.transition(RunState::Failed)?;
        Ok(())
    }
}
