//! Transport error types.

use thiserror::Error;

/// Errors from a single authenticated HTTP exchange.
///
/// Cloneable so one failure can be handed to every operation of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be built or sent, or the body could not be read.
    #[error("failed to send request: {message}")]
    Request { message: String },

    /// The remote side answered with a non-2xx status.
    #[error("unexpected status code: {status}, response body: {body}")]
    Status { status: u16, body: String },

    /// The exchange did not complete within its deadline.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// No bearer token could be obtained.
    #[error("failed to get access token: {message}")]
    Auth { message: String },

    /// The target URL is not usable.
    #[error("invalid url: {message}")]
    InvalidUrl { message: String },
}

impl TransportError {
    /// Returns the HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::InvalidUrl {
                message: err.to_string(),
            }
        } else {
            TransportError::Request {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
