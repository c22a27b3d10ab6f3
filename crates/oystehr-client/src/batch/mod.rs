//! Request-coalescing batch client.
//!
//! Concurrent callers submit record operations; instead of one HTTP call per
//! operation, operations are queued and sent together as a single `batch`
//! bundle:
//!
//! 1. **Enqueue**: the caller's operation is appended to the pending queue
//!    together with a oneshot sender, and a drain is triggered.
//! 2. **Drain**: at most one drain runs per client. It repeatedly takes up to
//!    `max_batch_size` entries off the queue, assembles them, and sends the
//!    bundle under a per-batch deadline.
//! 3. **Fan-out**: the response is checked for one-to-one correspondence and
//!    each entry's result is delivered to its caller without blocking.
//!
//! Failures before a response is parsed (assembly, transport, deadline,
//! malformed response) fail every entry of that batch and nothing else.
//! A bad status on one entry fails only that entry. Failed batches are not
//! retried; callers re-submit if they want to.
//!
//! All state lives in the client instance and is lost when it is dropped.

mod client;
mod coordinator;
mod fanout;
mod queue;
mod types;

pub use client::BatchClient;
pub use coordinator::DrainCoordinator;
pub use queue::PendingQueue;
pub use types::{
    BatchConfig, BatchError, EntryResult, PendingEntry, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_SEND_TIMEOUT,
};

#[cfg(test)]
mod tests;
