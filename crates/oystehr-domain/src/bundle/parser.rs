//! Parses the inbound batch bundle into per-entry outcomes.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{BundleError, BundleResult};

use super::types::{BatchResponse, BatchResponseEntry};

/// Outcome of one sub-request, classified by its embedded status.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Embedded status in `[200, 300)`.
    Success { status: u16, resource: Value },
    /// Embedded status outside the success range; `body` carries the
    /// returned resource or operation outcome for diagnostics.
    Failure { status: u16, body: Value },
    /// The sub-response has no status or one that is not numeric.
    InvalidStatus { raw: String },
}

impl EntryOutcome {
    /// Returns true for 2xx outcomes.
    pub fn is_success(&self) -> bool {
        matches!(self, EntryOutcome::Success { .. })
    }
}

/// Parses a batch response and classifies each entry.
///
/// `expected` is the number of operations in the outbound bundle. Structural
/// problems (undecodable body, missing `entry`, count mismatch) fail the
/// whole batch; bad statuses only affect their own entry.
pub fn parse_batch_response(bytes: &[u8], expected: usize) -> BundleResult<Vec<EntryOutcome>> {
    let response: BatchResponse =
        serde_json::from_slice(bytes).map_err(|e| BundleError::Malformed {
            message: e.to_string(),
        })?;

    let entries = response.entry.ok_or(BundleError::MissingEntries)?;
    if entries.len() != expected {
        return Err(BundleError::CountMismatch {
            expected,
            actual: entries.len(),
        });
    }

    Ok(entries.into_iter().map(classify).collect())
}

fn classify(element: Value) -> EntryOutcome {
    let entry = match BatchResponseEntry::deserialize(&element) {
        Ok(entry) => entry,
        Err(_) => {
            return EntryOutcome::InvalidStatus {
                raw: element.to_string(),
            }
        }
    };
    let Some(response) = entry.response else {
        return EntryOutcome::InvalidStatus { raw: String::new() };
    };

    let status = match read_status(response.status) {
        Ok(status) => status,
        Err(raw) => return EntryOutcome::InvalidStatus { raw },
    };

    if (200..300).contains(&status) {
        EntryOutcome::Success {
            status,
            resource: entry.resource.unwrap_or(Value::Null),
        }
    } else {
        EntryOutcome::Failure {
            status,
            body: entry.resource.or(response.outcome).unwrap_or(Value::Null),
        }
    }
}

/// Reads an embedded status, returning its raw text when it is unusable.
fn read_status(status: Option<Value>) -> Result<u16, String> {
    match status {
        Some(Value::String(raw)) => parse_status(&raw).ok_or(raw),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| number.to_string()),
        Some(other) => Err(other.to_string()),
        None => Err(String::new()),
    }
}

/// Extracts the numeric code from an embedded status such as `"201"` or
/// `"404 Not Found"`.
pub fn parse_status(raw: &str) -> Option<u16> {
    let trimmed = raw.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}
