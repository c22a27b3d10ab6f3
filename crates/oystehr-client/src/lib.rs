//! oystehr-client: Request-coalescing client for the Oystehr API
//!
//! This crate ties the wire format and transport together:
//! - `batch`: pending queue, drain coordinator and response fan-out
//! - `records`: record CRUD routed through the batcher
//! - `functions`: deployment status polling with backoff
//! - `upload`: archive upload to pre-signed URLs
//! - `config` / `observability`: configuration loading and logging setup
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 oystehr-client                    │
//! ├──────────────────────────────────────────────────┤
//! │  records ──► batch ──► Transport (HTTP)           │
//! │  functions ─────────► Transport (HTTP)            │
//! │  upload ────────────► reqwest (pre-signed URL)    │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod functions;
pub mod observability;
pub mod records;
pub mod upload;

use std::sync::Arc;
use std::time::Duration;

use oystehr_domain::retry::RetryConfig;
use oystehr_transport::{ClientCredentials, HttpTransport, StaticToken, TokenProvider};
use tracing::info;

pub use batch::{BatchClient, BatchConfig, BatchError, EntryResult};
pub use config::{ClientConfig, ConfigLoadError};
pub use error::{ClientError, ClientResult};
pub use functions::{FunctionClient, FunctionInfo};
pub use records::RecordClient;

/// Record, function and upload clients built from one configuration.
///
/// The record and function clients share one token provider and one HTTP
/// connection pool.
pub struct OystehrClient {
    records: RecordClient<Arc<HttpTransport>>,
    functions: FunctionClient<Arc<HttpTransport>>,
    http: reqwest::Client,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl OystehrClient {
    /// Builds the clients after validating `config`.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let http = reqwest::Client::new();
        let tokens = token_provider(config, &http)?;

        let fhir = HttpTransport::new(
            config.api.fhir_base_url.clone(),
            config.project_id.clone(),
            Arc::clone(&tokens),
        )
        .with_client(http.clone());
        let functions = HttpTransport::new(
            config.api.functions_base_url.clone(),
            config.project_id.clone(),
            tokens,
        )
        .with_client(http.clone());

        info!(
            project_id = %config.project_id,
            fhir_base_url = %config.api.fhir_base_url,
            max_batch_size = config.batch.max_batch_size,
            "Created Oystehr client"
        );

        Ok(Self {
            records: RecordClient::new(BatchClient::new(
                Arc::new(fhir),
                config.batch.to_batch_config(),
            )),
            functions: FunctionClient::new(Arc::new(functions))
                .with_attempt_timeout(config.retry.attempt_timeout()),
            http,
            retry: config.retry.to_retry_config(),
            attempt_timeout: config.retry.attempt_timeout(),
        })
    }

    pub fn records(&self) -> &RecordClient<Arc<HttpTransport>> {
        &self.records
    }

    pub fn functions(&self) -> &FunctionClient<Arc<HttpTransport>> {
        &self.functions
    }

    /// Uploads a function archive using the configured backoff and attempt
    /// deadline.
    pub async fn upload_archive(&self, signed_url: &str, source: &str) -> ClientResult<()> {
        upload::upload_archive(
            &self.http,
            signed_url,
            source,
            &self.retry,
            self.attempt_timeout,
        )
        .await
    }
}

fn token_provider(
    config: &ClientConfig,
    http: &reqwest::Client,
) -> ClientResult<Arc<dyn TokenProvider>> {
    if let Some(token) = config.auth.token() {
        let provider: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(token));
        return Ok(provider);
    }

    let (client_id, client_secret) =
        config
            .auth
            .client_credentials()
            .ok_or_else(|| ConfigLoadError::Invalid {
                message: "no credentials configured".to_string(),
            })?;

    let provider: Arc<dyn TokenProvider> = Arc::new(
        ClientCredentials::new(
            config.api.token_url.clone(),
            config.api.audience.clone(),
            client_id,
            client_secret,
        )
        .with_client(http.clone()),
    );
    Ok(provider)
}
