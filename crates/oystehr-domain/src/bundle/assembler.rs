//! Builds the outbound batch bundle.

use crate::error::{BundleError, BundleResult};

use super::types::{BatchRequest, BatchRequestEntry, EntryRequest, Operation};

const RESOURCE_TYPE: &str = "Bundle";
const BUNDLE_TYPE: &str = "batch";

/// Serializes operations into one `batch` bundle, preserving their order.
///
/// The output is deterministic: field order follows the wire structs and the
/// operations are emitted exactly as iterated.
pub fn assemble_batch<'a, I>(operations: I) -> BundleResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Operation>,
{
    let entry = operations
        .into_iter()
        .map(|op| BatchRequestEntry {
            request: EntryRequest {
                method: op.method,
                url: &op.target_path,
                if_match: op.if_match.as_deref().map(weak_etag),
            },
            resource: op.body.as_ref(),
        })
        .collect();

    let bundle = BatchRequest {
        resource_type: RESOURCE_TYPE,
        bundle_type: BUNDLE_TYPE,
        entry,
    };

    serde_json::to_vec(&bundle).map_err(|e| BundleError::Serialize {
        message: e.to_string(),
    })
}

/// Formats a version id as a weak entity tag (`W/"<version>"`).
///
/// Values that are already weak tags are passed through unchanged.
pub fn weak_etag(version: &str) -> String {
    if version.starts_with("W/\"") {
        version.to_string()
    } else {
        format!("W/\"{version}\"")
    }
}
