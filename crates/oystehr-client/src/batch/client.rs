//! Caller-facing handle to the batcher.

use std::sync::Arc;

use oystehr_domain::bundle::Operation;
use oystehr_transport::Transport;
use tokio::sync::oneshot;

use super::coordinator::DrainCoordinator;
use super::types::{BatchConfig, BatchError, EntryResult, PendingEntry};

/// Coalesces concurrent operations into batch requests.
///
/// Cloning is cheap; clones share one queue and one drain lock. Must be used
/// from within a Tokio runtime because every enqueue spawns a drain task.
///
/// # Example
///
/// ```ignore
/// let client = BatchClient::new(transport, BatchConfig::default());
/// let patient = client
///     .submit(Operation::new(Method::Get, "Patient/123"))
///     .await?;
/// ```
pub struct BatchClient<T: Transport> {
    coordinator: Arc<DrainCoordinator<T>>,
}

impl<T: Transport> Clone for BatchClient<T> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<T: Transport> BatchClient<T> {
    pub fn new(transport: T, config: BatchConfig) -> Self {
        Self {
            coordinator: Arc::new(DrainCoordinator::new(transport, config)),
        }
    }

    /// Queues `operation` and triggers a drain.
    ///
    /// Returns without touching the network. The receiver yields exactly one
    /// result; dropping it abandons the operation's result but not the
    /// operation itself.
    pub fn enqueue(&self, operation: Operation) -> oneshot::Receiver<EntryResult> {
        let (entry, receiver) = PendingEntry::new(operation);
        self.coordinator.queue().push(entry);
        self.trigger();
        receiver
    }

    /// Queues `operation` and waits for its result.
    pub async fn submit(&self, operation: Operation) -> EntryResult {
        self.enqueue(operation)
            .await
            .unwrap_or_else(|_| Err(BatchError::Closed))
    }

    /// Returns the number of operations not yet picked up by a drain.
    pub fn pending(&self) -> usize {
        self.coordinator.queue().len()
    }

    /// Returns the batch settings.
    pub fn config(&self) -> &BatchConfig {
        self.coordinator.config()
    }

    fn trigger(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            coordinator.drain().await;
        });
    }
}
