//! Retry with exponential backoff and full jitter.
//!
//! Used wherever the client waits on the remote side to settle: polling a
//! function deployment until it becomes active, and re-sending archive
//! uploads. The batch drain loop does not retry failed batches.
//!
//! The operation decides whether a failure is worth retrying by returning
//! [`RetryError::Transient`] or [`RetryError::Permanent`].
//!
//! # Example
//!
//! ```ignore
//! use oystehr_domain::retry::{retry_with_backoff, RetryConfig, RetryError};
//!
//! let status = retry_with_backoff(&RetryConfig::default(), || async {
//!     match fetch_status().await {
//!         Ok(s) if s == "Active" => Ok(s),
//!         Ok(s) => Err(RetryError::Transient(format!("status is {s}"))),
//!         Err(e) => Err(RetryError::Permanent(e.to_string())),
//!     }
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Default base backoff.
pub const BASE_BACKOFF_DEFAULT: Duration = Duration::from_millis(500);

/// Default backoff ceiling.
pub const MAX_BACKOFF_DEFAULT: Duration = Duration::from_millis(8000);

/// Default number of attempts.
pub const MAX_ATTEMPTS_DEFAULT: u32 = 3;

/// Backoff parameters. Stateless and reusable across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay ceiling before the first retry.
    pub base_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff: BASE_BACKOFF_DEFAULT,
            max_backoff: MAX_BACKOFF_DEFAULT,
            max_attempts: MAX_ATTEMPTS_DEFAULT,
        }
    }
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub const fn new(base_backoff: Duration, max_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            base_backoff,
            max_backoff,
            max_attempts,
        }
    }

    /// Sets the base backoff.
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Sets the backoff ceiling.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay ceiling after the zero-based `attempt` failed:
    /// `min(base_backoff * 2^attempt, max_backoff)`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Applies full jitter to the ceiling for `attempt`.
    ///
    /// `factor` is a uniform sample from `[0, 1)`; values outside that range
    /// are clamped.
    pub fn jittered_delay(&self, attempt: u32, factor: f64) -> Duration {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.backoff_ceiling(attempt).mul_f64(factor)
    }
}

/// Failure returned by a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Retry after a backoff, unless attempts are exhausted.
    Transient(E),
    /// Stop immediately and return the error.
    Permanent(E),
}

impl<E> RetryError<E> {
    /// Returns the wrapped error.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Transient(e) | RetryError::Permanent(e) => e,
        }
    }

    /// Returns true if the operation asked to be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, RetryError::Transient(_))
    }
}

/// Runs `operation` up to `config.max_attempts` times.
///
/// Returns the first success, the first permanent error, or the error of the
/// final attempt. A `max_attempts` of zero runs the operation once.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(e)) => return Err(e),
            Err(RetryError::Transient(e)) => {
                if attempt + 1 >= max_attempts {
                    return Err(e);
                }

                let factor: f64 = rand::thread_rng().gen();
                let backoff = config.backoff_ceiling(attempt);
                let jitter = config.jittered_delay(attempt, factor);
                debug!(
                    attempt = attempt + 1,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    jitter_ms = jitter.as_millis() as u64,
                    "Retrying operation after backoff"
                );

                tokio::time::sleep(jitter).await;
                attempt += 1;
            }
        }
    }
}
