//! Structured logging setup for processes hosting servers.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{subscriber::SetGlobalDefaultError, Subscriber};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `info,constellation_fabric=debug`
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Handle returned once telemetry is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install the global tracing subscriber on first call.
///
/// Later calls return a fresh handle without touching the global state, so
/// libraries and tests may call this freely.
pub fn init(config: &TelemetryConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: TelemetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TelemetryConfig::default());

        let config: TelemetryConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, DEFAULT_FILTER);
    }

    #[test]
    fn init_is_idempotent() {
        let config = TelemetryConfig::default();
        init(&config).unwrap();
        init(&config).unwrap();
    }

    #[test]
    fn bad_filter_is_reported() {
        let error = install_subscriber(&TelemetryConfig {
            filter: "constellation=loud".to_string(),
            format: LogFormat::Compact,
        })
        .unwrap_err();
        assert!(matches!(error, TelemetryError::Filter(_)));
    }
}
