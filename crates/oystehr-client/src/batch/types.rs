//! Data types for batched operations.

use std::time::Duration;

use oystehr_domain::bundle::Operation;
use oystehr_domain::error::BundleError;
use oystehr_transport::TransportError;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Default number of operations carried by one bundle.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default deadline for sending one bundle.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Batch client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum operations per bundle; `0` sends the whole queue at once.
    pub max_batch_size: usize,
    /// Deadline applied to each bundle send.
    pub send_timeout: Duration,
    /// Path (or absolute URL) the bundle is posted to.
    pub batch_path: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            batch_path: String::new(),
        }
    }
}

impl BatchConfig {
    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Sets the per-batch send deadline.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Sets the path the bundle is posted to.
    pub fn with_batch_path(mut self, batch_path: impl Into<String>) -> Self {
        self.batch_path = batch_path.into();
        self
    }
}

/// Errors delivered to callers of batched operations.
///
/// Cloneable because a whole-batch failure is handed to every entry.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum BatchError {
    /// The bundle could not be serialized.
    #[error("failed to assemble batch: {0}")]
    Assembly(BundleError),

    /// The bundle exchange failed (network, non-2xx, deadline).
    #[error("batch request failed: {0}")]
    Transport(#[from] TransportError),

    /// The response broke one-to-one correspondence or was not a bundle.
    #[error("invalid batch response: {0}")]
    Protocol(BundleError),

    /// The entry's embedded status was outside 2xx.
    #[error("entry failed with status {status}: {body}")]
    EntryFailed { status: u16, body: Value },

    /// The entry's embedded status could not be read.
    #[error("entry has invalid status '{raw}'")]
    InvalidStatus { raw: String },

    /// The client went away before producing a result.
    #[error("batch client closed before the operation completed")]
    Closed,
}

impl BatchError {
    /// Returns the embedded status of a per-entry failure.
    pub fn entry_status(&self) -> Option<u16> {
        match self {
            BatchError::EntryFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of one batched operation: the returned resource, or why it failed.
pub type EntryResult = Result<Value, BatchError>;

/// One caller's operation waiting in the queue.
#[derive(Debug)]
pub struct PendingEntry {
    operation: Operation,
    reply: oneshot::Sender<EntryResult>,
}

impl PendingEntry {
    /// Creates an entry and the receiver its caller waits on.
    pub fn new(operation: Operation) -> (Self, oneshot::Receiver<EntryResult>) {
        let (reply, receiver) = oneshot::channel();
        (Self { operation, reply }, receiver)
    }

    /// Returns the queued operation.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Hands the result to the caller without blocking.
    ///
    /// Returns false if the caller stopped listening; the result is dropped.
    pub(crate) fn deliver(self, result: EntryResult) -> bool {
        let PendingEntry { operation, reply } = self;
        if reply.send(result).is_err() {
            debug!(
                method = %operation.method,
                path = %operation.target_path,
                "Caller abandoned operation, dropping result"
            );
            return false;
        }
        true
    }
}
