//! Error types for batch bundle assembly and parsing.

use thiserror::Error;

/// Errors that fail an entire batch bundle.
///
/// None of these are per-entry: when one is returned, every operation that
/// was part of the bundle must be failed with it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BundleError {
    /// The outbound bundle could not be serialized.
    #[error("failed to serialize batch bundle: {message}")]
    Serialize { message: String },

    /// The response body is not a valid batch response document.
    #[error("malformed batch response: {message}")]
    Malformed { message: String },

    /// The response document has no `entry` array.
    #[error("batch response is missing the entry array")]
    MissingEntries,

    /// The remote side did not answer one-to-one.
    #[error("batch response has {actual} entries, expected {expected}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;
