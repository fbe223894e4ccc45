//! ReelVault Processing Library
//!
//! The video ingestion pipeline and the pieces it is built from:
//!
//! - [`inspector`]: probes a file with ffprobe and reads its frame dimensions
//! - [`rewriter`]: remuxes a file into a fast-start MP4 with ffmpeg
//! - [`scratch`]: per-request temporary directory, removed on drop
//! - [`validator`]: declared content type and size checks
//! - [`ingest`]: the orchestrator tying them to storage and the record store

pub mod ingest;
pub mod inspector;
mod process;
pub mod rewriter;
pub mod scratch;
pub mod validator;

pub use ingest::{
    IngestError, IngestFailure, IngestOutcome, IngestStage, IngestionOrchestrator,
    ThumbnailOutcome, ThumbnailUpload, VideoUpload,
};
pub use inspector::{FfprobeInspector, InspectError, MediaInspector, VideoDimensions};
pub use process::ToolError;
pub use rewriter::{FfmpegRewriter, RewriteError, StreamRewriter};
pub use scratch::ScratchSpace;
pub use validator::{MediaValidator, ValidationError};
