//! oystehr-domain: Core batching and retry logic
//!
//! This crate contains the pieces of the client that do not perform I/O:
//! - Batch bundle wire format (assembly and response parsing)
//! - Retry with exponential backoff and full jitter
//! - Error types for malformed bundles
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               oystehr-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  bundle/  - Batch request/response format   │
//! │  retry/   - Backoff retrier                 │
//! │  error.rs - Bundle error taxonomy           │
//! └─────────────────────────────────────────────┘
//! ```

pub mod bundle;
pub mod error;
pub mod retry;

// Re-export commonly used types at the crate root
pub use bundle::{assemble_batch, parse_batch_response, EntryOutcome, Method, Operation};
pub use error::{BundleError, BundleResult};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
