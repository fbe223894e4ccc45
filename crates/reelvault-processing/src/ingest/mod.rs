//! Video and thumbnail ingestion.
//!
//! A run moves through [`IngestStage`]s in order and either reaches `Finalized`
//! or stops with an [`IngestError`] naming the stage it failed to enter. Scratch
//! files never outlive the run.

mod error;
mod orchestrator;

pub use error::{IngestError, IngestFailure, IngestStage};
pub use orchestrator::{
    IngestOutcome, IngestionOrchestrator, ThumbnailOutcome, ThumbnailUpload, VideoUpload,
};
