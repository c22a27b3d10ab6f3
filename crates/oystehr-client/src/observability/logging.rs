//! Structured logging setup.
//!
//! The client only emits `tracing` events; applications embedding it decide
//! where they go. [`init_logging`] installs a global subscriber for
//! applications that have none of their own.
//!
//! # Log Format
//!
//! With JSON output, each event is one object per line:
//!
//! ```json
//! {"timestamp":"2024-01-15T10:30:00.000Z","level":"WARN","fields":{"message":"Batch request failed","entries":12},"target":"oystehr_client::batch::coordinator","span":{"entries":12,"name":"batch"}}
//! ```
//!
//! # Spans
//!
//! - `batch`: one bundle send, with `entries`
//! - `await_active_with`: deployment polling, with `id`
//! - `upload_archive`: archive upload, with `source`
//!
//! [`LoggingConfig::with_spans`] additionally logs span enter and exit.
//!
//! # Usage
//!
//! ```ignore
//! use oystehr_client::observability::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::json());
//! init_logging(LoggingConfig::text().with_level(tracing::Level::DEBUG));
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Logging output settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON lines (true) or human-readable text (false)
    pub json_format: bool,
    /// Level used when RUST_LOG is not set
    pub default_level: Level,
    /// Emit span enter/exit events
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        Self {
            json_format: false,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Later calls are no-ops because
/// a global subscriber can only be set once.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_span_events(span_events).with_target(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Builds a JSON subscriber writing to `writer`, for capturing output in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
