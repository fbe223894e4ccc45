//! The object store seam used by the ingestion pipeline.
//!
//! S3 and the local directory backend both sit behind [`Storage`].

use crate::StorageBackend;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Failure talking to an object backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object write failed: {0}")]
    UploadFailed(String),

    #[error("Object read failed: {0}")]
    DownloadFailed(String),

    #[error("Object removal failed: {0}")]
    DeleteFailed(String),

    #[error("No object stored under key {0}")]
    NotFound(String),

    #[error("Rejected object key: {0}")]
    InvalidKey(String),

    #[error("Object backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object backend misconfigured: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-addressed object storage.
///
/// The bucket (or base directory) is fixed when the backend is built; every call
/// addresses objects by key only. Writes overwrite any existing object at the key
/// and are never reported as successful unless the whole body was stored.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload everything `reader` yields under `storage_key` and return the public URL.
    ///
    /// The reader is consumed in bounded chunks; implementations must not buffer the
    /// whole body in memory.
    async fn put_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String>;

    /// Upload a local file under `storage_key` and return the public URL.
    async fn put_file(
        &self,
        storage_key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<String> {
        let file = tokio::fs::File::open(path).await?;
        let reader = Box::pin(file) as Pin<Box<dyn AsyncRead + Send + Unpin>>;
        self.put_stream(storage_key, content_type, reader).await
    }

    /// Whole object body, or `NotFound`
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Remove the object; a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Public URL of the object stored under `storage_key`
    fn public_url(&self, storage_key: &str) -> String;

    fn backend_type(&self) -> StorageBackend;
}
