//! Drain coordinator: at most one batch in flight per client.

use oystehr_domain::bundle::{assemble_batch, Method};
use oystehr_domain::BundleResult;
use oystehr_transport::{Transport, TransportError};
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

use super::fanout::{fail_all, fan_out};
use super::queue::PendingQueue;
use super::types::{BatchConfig, BatchError, PendingEntry};

/// Turns a batch into the outbound request body.
pub(crate) type Encoder = fn(&[PendingEntry]) -> BundleResult<Vec<u8>>;

fn encode_bundle(batch: &[PendingEntry]) -> BundleResult<Vec<u8>> {
    assemble_batch(batch.iter().map(|entry| entry.operation()))
}

/// Owns the pending queue and serializes batch sends.
///
/// The drain lock is separate from the queue mutex, so enqueueing never waits
/// for a batch in flight.
pub struct DrainCoordinator<T: Transport> {
    transport: T,
    queue: PendingQueue,
    config: BatchConfig,
    drain_lock: Mutex<()>,
    encode: Encoder,
}

impl<T: Transport> DrainCoordinator<T> {
    pub fn new(transport: T, config: BatchConfig) -> Self {
        Self {
            transport,
            queue: PendingQueue::new(),
            config,
            drain_lock: Mutex::new(()),
            encode: encode_bundle,
        }
    }

    /// Replaces the bundle encoder.
    #[cfg(test)]
    pub(crate) fn with_encoder(mut self, encode: Encoder) -> Self {
        self.encode = encode;
        self
    }

    /// Returns the pending queue.
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Returns the batch settings.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Sends everything queued, one batch at a time.
    ///
    /// Returns immediately with 0 if another drain holds the lock; that drain
    /// picks up whatever is queued. Returns the number of batches sent.
    pub async fn drain(&self) -> usize {
        let mut batches = 0;

        loop {
            let guard = match self.drain_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    trace!("Drain already in progress");
                    return batches;
                }
            };

            loop {
                let batch = self.queue.drain_up_to(self.config.max_batch_size);
                if batch.is_empty() {
                    break;
                }
                self.process(batch).await;
                batches += 1;
            }

            drop(guard);

            // An entry pushed after the last empty check may have had its
            // trigger rejected by the lock we just released.
            if self.queue.is_empty() {
                return batches;
            }
        }
    }

    /// Assembles, sends and fans out one batch.
    ///
    /// An encoding failure fails every entry of the batch. The JSON encoder
    /// cannot fail for `serde_json::Value` bodies, but the queue must still be
    /// emptied if it ever does.
    #[instrument(name = "batch", skip_all, fields(entries = batch.len()))]
    async fn process(&self, batch: Vec<PendingEntry>) {
        let entries = batch.len();

        let body = match (self.encode)(&batch) {
            Ok(body) => body,
            Err(e) => {
                warn!(entries, error = %e, "Failed to assemble batch");
                fail_all(batch, BatchError::Assembly(e));
                return;
            }
        };

        debug!(entries, bytes = body.len(), "Sending batch");

        let timeout = self.config.send_timeout;
        let response = tokio::time::timeout(
            timeout,
            self.transport
                .send(Method::Post, &self.config.batch_path, Some(body)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(TransportError::Timeout {
                duration_ms: timeout.as_millis() as u64,
            })
        });

        match response {
            Ok(bytes) => {
                let delivered = fan_out(batch, &bytes);
                debug!(entries, delivered, "Batch completed");
            }
            Err(e) => {
                warn!(entries, error = %e, "Batch request failed");
                fail_all(batch, BatchError::Transport(e));
            }
        }
    }
}
