//! Client configuration.
//!
//! Sources, lowest precedence first:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables
//!
//! Environment variables use the `OYSTEHR_` prefix and `__` between nested
//! keys: `OYSTEHR_BATCH__MAX_BATCH_SIZE=50` overrides `batch.max_batch_size`,
//! `OYSTEHR_PROJECT_ID=...` overrides `project_id`.
//!
//! # Example
//!
//! ```ignore
//! use oystehr_client::config::ClientConfig;
//!
//! let config = ClientConfig::load("oystehr.yaml")?;
//! // or
//! let config = ClientConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use oystehr_domain::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::batch::BatchConfig;
use crate::observability::LoggingConfig;

const ENV_PREFIX: &str = "OYSTEHR";

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    /// Project every request is scoped to
    #[serde(default)]
    pub project_id: String,

    /// API endpoints
    #[serde(default)]
    pub api: ApiSettings,

    /// Credentials
    #[serde(default)]
    pub auth: AuthSettings,

    /// Request batching
    #[serde(default)]
    pub batch: BatchSettings,

    /// Backoff for polling and uploads
    #[serde(default)]
    pub retry: RetrySettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Remote endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiSettings {
    /// Record API root; batch bundles are posted here
    #[serde(default = "default_fhir_base_url")]
    pub fhir_base_url: String,

    /// Functions API root
    #[serde(default = "default_functions_base_url")]
    pub functions_base_url: String,

    /// OAuth token endpoint for client credentials
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Audience requested with client credentials
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            fhir_base_url: default_fhir_base_url(),
            functions_base_url: default_functions_base_url(),
            token_url: default_token_url(),
            audience: default_audience(),
        }
    }
}

fn default_fhir_base_url() -> String {
    "https://fhir-api.zapehr.com".to_string()
}

fn default_functions_base_url() -> String {
    "https://zambda-api.zapehr.com/v1/zambda".to_string()
}

fn default_token_url() -> String {
    "https://auth.zapehr.com/oauth/token".to_string()
}

fn default_audience() -> String {
    "https://api.zapehr.com".to_string()
}

/// Credentials: either a pre-issued access token or a client id and secret.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AuthSettings {
    /// Pre-issued access token; takes precedence over client credentials
    pub access_token: Option<String>,

    pub client_id: Option<String>,

    pub client_secret: Option<String>,
}

impl AuthSettings {
    /// Returns the access token if one is set and non-blank.
    pub fn token(&self) -> Option<&str> {
        non_blank(&self.access_token)
    }

    /// Returns the client id and secret if both are set and non-blank.
    pub fn client_credentials(&self) -> Option<(&str, &str)> {
        Some((non_blank(&self.client_id)?, non_blank(&self.client_secret)?))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Request batching settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BatchSettings {
    /// Operations per bundle; 0 sends the whole queue in one bundle
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Deadline for one bundle send in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Path the bundle is posted to, relative to the record API root
    #[serde(default)]
    pub batch_path: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            send_timeout_secs: default_send_timeout(),
            batch_path: String::new(),
        }
    }
}

impl BatchSettings {
    pub fn to_batch_config(&self) -> BatchConfig {
        BatchConfig::default()
            .with_max_batch_size(self.max_batch_size)
            .with_send_timeout(Duration::from_secs(self.send_timeout_secs))
            .with_batch_path(self.batch_path.clone())
    }
}

fn default_max_batch_size() -> usize {
    crate::batch::DEFAULT_MAX_BATCH_SIZE
}

fn default_send_timeout() -> u64 {
    crate::batch::DEFAULT_SEND_TIMEOUT.as_secs()
}

/// Backoff settings for deployment polling and archive uploads.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline for one poll or upload attempt.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.max_attempts,
        )
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

fn default_base_backoff() -> u64 {
    oystehr_domain::retry::BASE_BACKOFF_DEFAULT.as_millis() as u64
}

fn default_max_backoff() -> u64 {
    oystehr_domain::retry::MAX_BACKOFF_DEFAULT.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    oystehr_domain::retry::MAX_ATTEMPTS_DEFAULT
}

fn default_attempt_timeout() -> u64 {
    crate::functions::DEFAULT_ATTEMPT_TIMEOUT.as_secs()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Converts to a logging configuration. An unknown level falls back to INFO.
    pub fn to_logging_config(&self) -> LoggingConfig {
        let base = if self.json {
            LoggingConfig::json()
        } else {
            LoggingConfig::text()
        };
        base.with_level(self.level.parse().unwrap_or(Level::INFO))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ClientConfig {
    /// Loads a YAML file with environment variable overrides, then validates.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;

        Ok(client_config)
    }

    /// Loads defaults with environment variable overrides, then validates.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ClientConfig::default())?)
            .add_source(environment())
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;

        Ok(client_config)
    }

    /// Checks the configuration for values the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.project_id.trim().is_empty() {
            return Err(invalid("project_id is required"));
        }

        if self.auth.token().is_none() && self.auth.client_credentials().is_none() {
            return Err(invalid(
                "auth.access_token or both auth.client_id and auth.client_secret are required",
            ));
        }

        for (name, url) in [
            ("api.fhir_base_url", &self.api.fhir_base_url),
            ("api.functions_base_url", &self.api.functions_base_url),
            ("api.token_url", &self.api.token_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!(
                    "{name} must be an http(s) URL, got: {url}"
                )));
            }
        }

        if self.batch.send_timeout_secs == 0 {
            return Err(invalid("batch.send_timeout_secs must be greater than 0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be greater than 0"));
        }

        if self.retry.attempt_timeout_secs == 0 {
            return Err(invalid("retry.attempt_timeout_secs must be greater than 0"));
        }

        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(invalid(format!(
                "retry.base_backoff_ms ({}) must not exceed retry.max_backoff_ms ({})",
                self.retry.base_backoff_ms, self.retry.max_backoff_ms
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn invalid(message: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.into(),
    }
}
