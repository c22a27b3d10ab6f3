//! Transport trait definition.

use std::sync::Arc;

use async_trait::async_trait;
use oystehr_domain::bundle::Method;

use crate::error::TransportResult;

/// One authenticated request/response exchange with the remote API.
///
/// Implementations must be thread-safe (Send + Sync). Deadlines are applied
/// by the caller; a non-2xx top-level status must be reported as
/// [`TransportError::Status`](crate::TransportError::Status).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends `body` to `url` and returns the raw response body.
    ///
    /// `url` is either absolute or relative to the transport's base URL.
    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>)
        -> TransportResult<Vec<u8>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> TransportResult<Vec<u8>> {
        (**self).send(method, url, body).await
    }
}
