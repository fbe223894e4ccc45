//! ReelVault Storage Library
//!
//! This crate provides the object store client used by the ingestion pipeline:
//! the `Storage` trait with S3 and local filesystem implementations, and the
//! derivation of collision-resistant storage keys.
//!
//! # Storage key format
//!
//! - **Videos**: `{classification}/{64 hex chars}` (e.g. `landscape/9f1c…`)
//! - **Thumbnails**: `thumbnails/{43 base64url chars}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{derive_storage_key, derive_thumbnail_key, KeyError};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use reelvault_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
