//! ReelVault Infrastructure Library
//!
//! Process-level plumbing shared by ReelVault binaries:
//! - Telemetry initialization (`tracing` subscriber)
//! - Shutdown signal handling

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod shutdown;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat, TelemetryError};

pub use shutdown::cancel_on_shutdown;
