//! Batch bundle wire format.
//!
//! Several record operations are submitted to the remote API as a single
//! bundle of type `batch`. The remote side answers with one entry per
//! submitted operation, in the same order. There are no entry identifiers,
//! so correlation is purely positional: the assembler must never reorder
//! operations and the parser must reject any response whose entry count
//! differs from the request.
//!
//! # Request
//!
//! ```json
//! {
//!   "resourceType": "Bundle",
//!   "type": "batch",
//!   "entry": [
//!     { "request": { "method": "PUT", "url": "Patient/1", "ifMatch": "W/\"3\"" },
//!       "resource": { "resourceType": "Patient", "id": "1" } }
//!   ]
//! }
//! ```
//!
//! # Response
//!
//! ```json
//! { "entry": [ { "resource": { }, "response": { "status": "200" } } ] }
//! ```

mod assembler;
mod parser;
mod types;

pub use assembler::{assemble_batch, weak_etag};
pub use parser::{parse_batch_response, parse_status, EntryOutcome};
pub use types::{
    BatchRequest, BatchRequestEntry, BatchResponse, BatchResponseEntry, EntryRequest,
    EntryResponse, Method, Operation,
};
