//! Function deployment status polling.
//!
//! After a function is created or its archive is replaced, the remote side
//! deploys it asynchronously. [`FunctionClient::await_active`] polls the
//! function until it reports `Active` with the expected archive checksum,
//! stopping early on a `Failed` deployment. Each poll is bounded by an
//! attempt deadline; an expired poll is retried like a pending deployment.

use std::time::Duration;

use oystehr_domain::bundle::Method;
use oystehr_domain::retry::{retry_with_backoff, RetryConfig, RetryError};
use oystehr_transport::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{ClientError, ClientResult};

/// Polling budget for deployments: 500 ms base, 16 s cap, 10 attempts.
pub const DEPLOYMENT_RETRY: RetryConfig =
    RetryConfig::new(Duration::from_millis(500), Duration::from_millis(16_000), 10);

/// Deadline for a single poll or upload attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status of a deployed function that is ready to be invoked.
pub const STATUS_ACTIVE: &str = "Active";

/// Status of a function whose deployment will not complete.
pub const STATUS_FAILED: &str = "Failed";

/// Function resource as returned by the functions API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub trigger_method: Option<String>,
    #[serde(default)]
    pub file_info: Option<FileInfo>,
}

/// Archive currently attached to a function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Reads function resources over a transport rooted at the functions API.
pub struct FunctionClient<T: Transport> {
    transport: T,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl<T: Transport> FunctionClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: DEPLOYMENT_RETRY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Overrides the polling budget used by [`await_active`](Self::await_active).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the deadline applied to each poll.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Fetches one function.
    pub async fn get(&self, id: &str) -> ClientResult<FunctionInfo> {
        let bytes = self.transport.send(Method::Get, id, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            what: format!("function {id}"),
            message: e.to_string(),
        })
    }

    /// Polls until the function is active with `expected_checksum`.
    pub async fn await_active(&self, id: &str, expected_checksum: &str) -> ClientResult<FunctionInfo> {
        self.await_active_with(id, expected_checksum, &self.retry)
            .await
    }

    /// Like [`await_active`](Self::await_active) with an explicit budget.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn await_active_with(
        &self,
        id: &str,
        expected_checksum: &str,
        retry: &RetryConfig,
    ) -> ClientResult<FunctionInfo> {
        let timeout = self.attempt_timeout;
        let function = retry_with_backoff(retry, || async {
            let fetched = tokio::time::timeout(timeout, self.get(id))
                .await
                .unwrap_or_else(|_| {
                    Err(ClientError::Transport(TransportError::Timeout {
                        duration_ms: timeout.as_millis() as u64,
                    }))
                });

            match fetched {
                Ok(function) => check_deployment(&function, expected_checksum).map(|()| function),
                Err(e @ ClientError::Transport(TransportError::Timeout { .. })) => {
                    debug!(id, error = %e, "Function poll timed out");
                    Err(RetryError::Transient(e))
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await?;

        info!(id, "Function is active");
        Ok(function)
    }
}

/// Classifies a polled function.
///
/// `Failed` stops polling. A missing or non-active status, missing file info,
/// or a checksum that differs from `expected_checksum` keeps polling. A
/// function that reports no checksum is accepted.
pub fn check_deployment(
    function: &FunctionInfo,
    expected_checksum: &str,
) -> Result<(), RetryError<ClientError>> {
    let pending = |reason: String| {
        debug!(id = %function.id, reason = %reason, "Function not active yet");
        RetryError::Transient(ClientError::DeploymentPending {
            id: function.id.clone(),
            reason,
        })
    };

    let status = match function.status.as_deref() {
        Some(status) => status,
        None => return Err(pending("status is missing".to_string())),
    };
    if status == STATUS_FAILED {
        return Err(RetryError::Permanent(ClientError::DeploymentFailed {
            id: function.id.clone(),
        }));
    }
    if status != STATUS_ACTIVE {
        return Err(pending(format!("status is {status}, expecting {STATUS_ACTIVE}")));
    }

    let file_info = match &function.file_info {
        Some(file_info) => file_info,
        None => return Err(pending("file info is missing".to_string())),
    };
    if let Some(checksum) = &file_info.checksum {
        if checksum != expected_checksum {
            return Err(pending(format!(
                "checksum is {checksum}, expecting {expected_checksum}"
            )));
        }
    }

    Ok(())
}
