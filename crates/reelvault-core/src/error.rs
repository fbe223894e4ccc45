//! Error metadata shared by every ReelVault error type.
//!
//! Errors raised by the pipeline are plain `thiserror` enums in the crate that
//! owns them. The calling layer (HTTP handler, CLI) presents them through the
//! `ErrorMetadata` trait instead of matching on concrete variants.

/// Severity a failure is logged at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Rejected input; routine
    Debug,
    /// Retryable: timeouts, a collaborator that is down
    Warn,
    Error,
}

/// Presentation of a failure to whoever triggered it
pub trait ErrorMetadata {
    /// Status an HTTP surface would answer with
    fn http_status_code(&self) -> u16;

    /// Stable code such as `UNSUPPORTED_FORMAT`
    fn error_code(&self) -> &'static str;

    /// Whether the same request may succeed if retried later
    fn is_recoverable(&self) -> bool;

    /// Message safe to show outside the service
    fn client_message(&self) -> String;

    fn log_level(&self) -> LogLevel;
}
