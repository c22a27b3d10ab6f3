//! Data types for batch bundles.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verb of a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Returns the verb as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical record operation waiting to be placed in a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The HTTP verb.
    pub method: Method,
    /// Resource path relative to the record API root (e.g. "Patient/123").
    pub target_path: String,
    /// Resource payload for create and update.
    pub body: Option<Value>,
    /// Version the remote resource must still have for the operation to apply.
    pub if_match: Option<String>,
}

impl Operation {
    /// Creates an operation without a body or precondition.
    pub fn new(method: Method, target_path: impl Into<String>) -> Self {
        Self {
            method,
            target_path: target_path.into(),
            body: None,
            if_match: None,
        }
    }

    /// Attaches a resource payload.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a conditional version tag.
    pub fn with_if_match(mut self, version: impl Into<String>) -> Self {
        self.if_match = Some(version.into());
        self
    }
}

/// Outbound bundle document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest<'a> {
    pub resource_type: &'static str,
    #[serde(rename = "type")]
    pub bundle_type: &'static str,
    pub entry: Vec<BatchRequestEntry<'a>>,
}

/// One sub-request inside an outbound bundle.
#[derive(Debug, Serialize)]
pub struct BatchRequestEntry<'a> {
    pub request: EntryRequest<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<&'a Value>,
}

/// Verb, target and precondition of a sub-request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,
}

/// Inbound bundle document.
///
/// `entry` is optional so that a response without it can be reported as a
/// protocol failure instead of a generic decode error. Elements stay as raw
/// JSON so that one malformed sub-response cannot fail its siblings.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub entry: Option<Vec<Value>>,
}

/// One sub-response inside an inbound bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponseEntry {
    #[serde(default)]
    pub resource: Option<Value>,
    #[serde(default)]
    pub response: Option<EntryResponse>,
}

/// Embedded HTTP result of a sub-request.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryResponse {
    /// Usually a string such as "201" or "201 Created"; bare numbers are
    /// also accepted.
    #[serde(default)]
    pub status: Option<Value>,
    /// Operation outcome returned alongside failures.
    #[serde(default)]
    pub outcome: Option<Value>,
}
