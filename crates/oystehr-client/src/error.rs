//! Client error types.

use oystehr_transport::TransportError;
use thiserror::Error;

use crate::batch::BatchError;
use crate::config::ConfigLoadError;

/// Errors returned by the client facades.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A batched operation failed; `operation` names it (e.g. "create Patient").
    #[error("failed to {operation}: {source}")]
    Batch {
        operation: String,
        #[source]
        source: BatchError,
    },

    /// A direct (unbatched) request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response body did not have the expected shape.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// The function did not become active within the polling budget.
    #[error("function {id} is not active: {reason}")]
    DeploymentPending { id: String, reason: String },

    /// The function reported a failed deployment.
    #[error("function {id} deployment failed with status 'Failed'")]
    DeploymentFailed { id: String },

    /// The archive upload was rejected.
    #[error("failed to upload archive: {message}")]
    Upload { message: String },

    /// A local file could not be read.
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigLoadError),
}

impl ClientError {
    /// Wraps a batch failure with the operation it belongs to.
    pub fn batch(operation: impl Into<String>, source: BatchError) -> Self {
        ClientError::Batch {
            operation: operation.into(),
            source,
        }
    }

    /// Returns the per-entry or top-level HTTP status, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Batch { source, .. } => match source {
                BatchError::EntryFailed { status, .. } => Some(*status),
                BatchError::Transport(e) => e.status(),
                _ => None,
            },
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true if the remote side reported the record as absent.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
