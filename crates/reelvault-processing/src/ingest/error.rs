use reelvault_core::{ErrorMetadata, LogLevel, RecordStoreError};
use reelvault_storage::{KeyError, StorageError};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::inspector::InspectError;
use crate::process::ToolError;
use crate::rewriter::RewriteError;

/// Pipeline position of an ingestion run.
///
/// A failure is attributed to the stage the run was moving into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStage {
    Received,
    Buffered,
    Validated,
    Inspected,
    Rewritten,
    KeyDerived,
    Stored,
    Finalized,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Received => "received",
            IngestStage::Buffered => "buffered",
            IngestStage::Validated => "validated",
            IngestStage::Inspected => "inspected",
            IngestStage::Rewritten => "rewritten",
            IngestStage::KeyDerived => "key_derived",
            IngestStage::Stored => "stored",
            IngestStage::Finalized => "finalized",
        }
    }
}

impl Display for IngestStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestFailure {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Upload is empty")]
    EmptyUpload,

    #[error("Unsupported content type: {content_type}")]
    UnsupportedFormat { content_type: String },

    #[error("Inspection failed: {0}")]
    Inspect(#[from] InspectError),

    #[error("Rewrite failed: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("Key derivation failed: {0}")]
    Key(#[from] KeyError),

    #[error("Store unavailable: {0}")]
    Store(#[from] StorageError),

    #[error("Media record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("Failed to fetch media record: {0}")]
    RecordFetch(#[source] RecordStoreError),

    #[error("Failed to update media record: {0}")]
    RecordUpdate(#[source] RecordStoreError),

    #[error("Ingestion cancelled")]
    Cancelled,
}

impl IngestFailure {
    fn is_timeout(&self) -> bool {
        matches!(
            self,
            IngestFailure::Inspect(InspectError::Tool(ToolError::Timeout { .. }))
                | IngestFailure::Rewrite(RewriteError::Tool(ToolError::Timeout { .. }))
        )
    }
}

/// Terminal failure of an ingestion run: where it stopped and why.
#[derive(Debug, thiserror::Error)]
#[error("Ingestion failed at {stage}: {cause}")]
pub struct IngestError {
    pub stage: IngestStage,
    #[source]
    pub cause: IngestFailure,
}

impl IngestError {
    pub fn new(stage: IngestStage, cause: IngestFailure) -> Self {
        Self { stage, cause }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, IngestFailure::Cancelled)
    }
}

/// (status, code, recoverable, log level)
fn static_metadata(err: &IngestError) -> (u16, &'static str, bool, LogLevel) {
    if err.cause.is_timeout() {
        return (504, "PROCESSING_TIMEOUT", true, LogLevel::Warn);
    }

    match &err.cause {
        IngestFailure::Io(_) => (500, "UPLOAD_IO_ERROR", true, LogLevel::Error),
        IngestFailure::PayloadTooLarge { .. } => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        IngestFailure::EmptyUpload => (400, "EMPTY_UPLOAD", false, LogLevel::Debug),
        IngestFailure::UnsupportedFormat { .. } => {
            (415, "UNSUPPORTED_FORMAT", false, LogLevel::Debug)
        }
        IngestFailure::Inspect(InspectError::Tool(_))
        | IngestFailure::Rewrite(RewriteError::Tool(_)) => {
            (500, "MEDIA_TOOL_ERROR", false, LogLevel::Error)
        }
        IngestFailure::Inspect(_) => (422, "PROBE_FAILED", false, LogLevel::Warn),
        IngestFailure::Rewrite(_) => (422, "REWRITE_FAILED", false, LogLevel::Warn),
        IngestFailure::Key(_) => (500, "KEY_DERIVATION_FAILED", false, LogLevel::Error),
        IngestFailure::Store(_) => (503, "STORE_UNAVAILABLE", true, LogLevel::Error),
        IngestFailure::RecordNotFound(_) => (404, "RECORD_NOT_FOUND", false, LogLevel::Debug),
        IngestFailure::RecordFetch(_) => (503, "RECORD_STORE_UNAVAILABLE", true, LogLevel::Error),
        IngestFailure::RecordUpdate(_) => (500, "RECORD_UPDATE_FAILED", true, LogLevel::Error),
        IngestFailure::Cancelled => (499, "CANCELLED", true, LogLevel::Debug),
    }
}

impl ErrorMetadata for IngestError {
    fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match &self.cause {
            IngestFailure::PayloadTooLarge { limit } => {
                format!("Upload exceeds the maximum size of {} bytes", limit)
            }
            IngestFailure::EmptyUpload => "Upload is empty".to_string(),
            IngestFailure::UnsupportedFormat { content_type } => {
                format!("Unsupported content type: {}", content_type)
            }
            IngestFailure::RecordNotFound(id) => format!("Media record {} not found", id),
            IngestFailure::Cancelled => "Upload was cancelled".to_string(),
            _ if self.cause.is_timeout() => "Video processing timed out".to_string(),
            IngestFailure::Inspect(_) => "Could not read video stream information".to_string(),
            IngestFailure::Rewrite(_) => "Could not prepare video for streaming".to_string(),
            IngestFailure::Store(_) => "Failed to access storage".to_string(),
            IngestFailure::RecordFetch(_) => "Failed to access media records".to_string(),
            IngestFailure::Io(_)
            | IngestFailure::Key(_)
            | IngestFailure::RecordUpdate(_) => "Internal server error".to_string(),
        }
    }
}
