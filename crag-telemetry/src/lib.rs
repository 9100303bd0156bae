//! Logging setup for crag binaries and tests.
//!
//! [`init_telemetry`] installs a global `tracing` subscriber whose filter comes
//! from `RUST_LOG`, falling back to [`TelemetryConfig::default_directive`].
//! [`init_with_capture`] additionally records every event in an [`EventLog`],
//! which tests use to assert on emitted progress messages.

pub mod memory;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use memory::{CapturedEvent, EventLog, InMemoryEventLayer};

/// Errors raised while installing a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    UnknownFormat(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Name recorded on the startup event.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or `"crag_core=debug"`.
    pub default_directive: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "crag".to_string(),
            default_directive: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), ..Self::default() }
    }

    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// The filter in effect: `RUST_LOG` if set and valid, else the default directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_directive)
                .map_err(|e| TelemetryError::Filter(format!("{}: {e}", self.default_directive))),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the default directive does not parse or a global subscriber was
/// already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    install(config, None)
}

/// Install the global subscriber and mirror every event into `log`.
pub fn init_with_capture(
    config: &TelemetryConfig,
    log: Arc<EventLog>,
) -> Result<(), TelemetryError> {
    install(config, Some(InMemoryEventLayer::new(log)))
}

fn install(
    config: &TelemetryConfig,
    capture: Option<InMemoryEventLayer>,
) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter).with(capture);

    let result = match config.format {
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer().with_target(false)).try_init()
        }
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    };
    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        format = ?config.format,
        "telemetry initialized"
    );
    Ok(())
}
