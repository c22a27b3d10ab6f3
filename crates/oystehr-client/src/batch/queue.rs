//! Pending operation queue.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::types::PendingEntry;

/// FIFO of operations not yet sent.
///
/// Every access goes through one mutex; removal for a drain is atomic with
/// selection, so an entry can only ever be part of one batch.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Mutex<VecDeque<PendingEntry>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingEntry>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends an entry. Never waits on anything but the queue mutex.
    pub fn push(&self, entry: PendingEntry) {
        self.lock().push_back(entry);
    }

    /// Removes and returns the first `max` entries in FIFO order.
    ///
    /// `max == 0` takes the whole queue.
    pub fn drain_up_to(&self, max: usize) -> Vec<PendingEntry> {
        let mut entries = self.lock();
        let count = if max == 0 {
            entries.len()
        } else {
            max.min(entries.len())
        };
        entries.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
