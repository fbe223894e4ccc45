//! Tracing subscriber initialization
//!
//! Installs a registry with an `EnvFilter` (falling back to `reelvault=debug`) and
//! a human-readable or JSON formatting layer.

use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "reelvault=debug,reelvault_core=debug,reelvault_storage=debug,reelvault_processing=debug,reelvault_cli=debug";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Unknown log format: {0} (expected 'text' or 'json')")]
    UnknownFormat(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Initialize tracing for the process. Fails if a global subscriber is already set.
pub fn init_telemetry(format: LogFormat) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(format = ?format, "Tracing initialized");
    Ok(())
}
