//! reqwest-backed transport.

use std::sync::Arc;

use async_trait::async_trait;
use oystehr_domain::bundle::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::TokenProvider;
use crate::error::{TransportError, TransportResult};
use crate::traits::Transport;

/// Header carrying the project the request is scoped to.
pub const PROJECT_HEADER: &str = "x-oystehr-project-id";

/// Authenticated JSON transport.
///
/// Every request carries `Authorization: Bearer <token>`, the project header
/// and `Content-Type: application/json`. A 401 answer invalidates the cached
/// token and the request is sent once more with a fresh one.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTransport {
    /// Creates a transport for `base_url` scoped to `project_id`.
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            tokens,
        }
    }

    /// Uses the given HTTP client (connection pool, proxies, TLS settings).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the base URL relative paths are joined to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves `url` against the base URL unless it is already absolute.
    /// An empty `url` addresses the base URL itself.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.is_empty() {
            self.base_url.trim_end_matches('/').to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> TransportResult<(StatusCode, Vec<u8>)> {
        let token = self.tokens.access_token().await?;

        let mut request = self
            .client
            .request(to_reqwest(method), url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(PROJECT_HEADER, &self.project_id);
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| TransportError::Request {
            message: format!("failed to read response body: {e}"),
        })?;

        Ok((status, bytes.to_vec()))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> TransportResult<Vec<u8>> {
        let url = self.resolve(url);

        let (mut status, mut bytes) = self.send_once(method, &url, body.as_deref()).await?;
        if status == StatusCode::UNAUTHORIZED {
            debug!(%url, "Access token rejected, refreshing");
            self.tokens.invalidate().await;
            (status, bytes) = self.send_once(method, &url, body.as_deref()).await?;
        }

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes)
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}
