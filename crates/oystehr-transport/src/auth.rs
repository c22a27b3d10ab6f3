//! Bearer token providers.
//!
//! The transport asks a [`TokenProvider`] for a token before every request.
//! [`ClientCredentials`] exchanges a client id and secret for a token on
//! first use, caches it, and fetches a new one after expiry or after
//! [`TokenProvider::invalidate`] is called (the transport does this when the
//! API answers 401).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// Tokens are refreshed this long before their advertised expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns a token, fetching one if none is cached.
    async fn access_token(&self) -> TransportResult<String>;

    /// Drops any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// A fixed, pre-issued access token.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> TransportResult<String> {
        Ok(self.token.clone())
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// OAuth client-credentials token provider.
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    audience: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    /// Creates a provider that posts to `token_url`.
    pub fn new(
        token_url: impl Into<String>,
        audience: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            cached: Mutex::new(None),
        }
    }

    /// Uses the given HTTP client for token requests.
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    async fn fetch(&self) -> TransportResult<CachedToken> {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: &self.audience,
        };

        let response = self
            .http
            .post(&self.token_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Auth {
                message: format!("failed to make request: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Auth {
                message: format!("received non-2xx response: {}", status.as_u16()),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| TransportError::Auth {
            message: format!("failed to decode response: {e}"),
        })?;

        let expires_at = body
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_SKEW));

        debug!(expires_in = ?body.expires_in, "Fetched access token");

        Ok(CachedToken {
            token: body.access_token,
            expires_at,
        })
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn access_token(&self) -> TransportResult<String> {
        // Held across the fetch so concurrent callers share one token request.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
