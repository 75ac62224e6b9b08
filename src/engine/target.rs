use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ScenarioError, TargetError};

use super::descriptor::{RequestDescriptor, TargetResponse};

/// Produces request descriptors. Called concurrently from every worker.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    /// Builds the descriptor for sequence number `seq`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] when the request cannot be built; the
    /// calling worker records it and moves on.
    fn build_request(&self, seq: u64) -> Result<RequestDescriptor, ScenarioError>;
}

/// Executes descriptors against the system under test.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Executes one descriptor. The engine applies the per-request timeout
    /// around this call.
    ///
    /// # Errors
    ///
    /// `TargetError::Request` for a failed request, `TargetError::Fatal` when
    /// this client handle is no longer usable.
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<TargetResponse, TargetError>;
}

/// Hands each worker its client handle.
pub trait ClientFactory: Send + Sync {
    /// Returns the client handle for `worker_id`. Clients that are safe to
    /// share return clones of one `Arc`; stateful clients build a fresh
    /// handle per worker.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle cannot be constructed. The pool treats
    /// that as an executor fault.
    fn connect(&self, worker_id: usize) -> Result<Arc<dyn TargetClient>, TargetError>;
}

/// Factory for a client that is shared read-only across all workers.
pub struct SharedClient {
    client: Arc<dyn TargetClient>,
}

impl SharedClient {
    #[must_use]
    pub fn new(client: Arc<dyn TargetClient>) -> Self {
        Self { client }
    }
}

impl ClientFactory for SharedClient {
    fn connect(&self, _worker_id: usize) -> Result<Arc<dyn TargetClient>, TargetError> {
        Ok(Arc::clone(&self.client))
    }
}
