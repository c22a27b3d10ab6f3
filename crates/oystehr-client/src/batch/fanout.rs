//! Delivers batch results back to waiting callers.

use oystehr_domain::bundle::{parse_batch_response, EntryOutcome};
use tracing::warn;

use super::types::{BatchError, EntryResult, PendingEntry};

/// Parses `bytes` and hands one result to each entry, in order.
///
/// Returns the number of results that reached a listening caller.
pub(crate) fn fan_out(batch: Vec<PendingEntry>, bytes: &[u8]) -> usize {
    let outcomes = match parse_batch_response(bytes, batch.len()) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            warn!(entries = batch.len(), error = %e, "Rejecting batch response");
            return fail_all(batch, BatchError::Protocol(e));
        }
    };

    batch
        .into_iter()
        .zip(outcomes)
        .map(|(entry, outcome)| entry.deliver(into_result(outcome)))
        .filter(|delivered| *delivered)
        .count()
}

/// Hands the same error to every entry of a batch.
pub(crate) fn fail_all(batch: Vec<PendingEntry>, error: BatchError) -> usize {
    batch
        .into_iter()
        .map(|entry| entry.deliver(Err(error.clone())))
        .filter(|delivered| *delivered)
        .count()
}

fn into_result(outcome: EntryOutcome) -> EntryResult {
    match outcome {
        EntryOutcome::Success { resource, .. } => Ok(resource),
        EntryOutcome::Failure { status, body } => Err(BatchError::EntryFailed { status, body }),
        EntryOutcome::InvalidStatus { raw } => Err(BatchError::InvalidStatus { raw }),
    }
}
