//! ReelVault Core Library
//!
//! This crate provides the domain models, error metadata, configuration and the
//! metadata-store collaborator contract shared by all ReelVault components.

pub mod config;
pub mod error;
pub mod models;
pub mod records;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, IngestConfig, StorageConfig};
pub use error::{ErrorMetadata, LogLevel};
pub use models::{AspectClassification, MediaRecord, MediaReference, StorageKey};
pub use records::{InMemoryRecordStore, MediaRecordStore, RecordStoreError};
pub use storage_types::StorageBackend;
