use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncRead;

/// Objects kept as plain files under one directory, for development and tests.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// `base_path` is created if missing. Public URLs are `base_url` joined with the key.
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Cannot create media directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Traversal keys are rejected before any filesystem access.
    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        let path = self.object_path(storage_key)?;
        let started = std::time::Instant::now();

        let dir = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => self.base_path.clone(),
        };
        fs::create_dir_all(&dir).await?;

        let result = async {
            // Deleted when dropped unless persisted, including when this future is dropped.
            let partial = tempfile::Builder::new()
                .prefix(".partial-")
                .tempfile_in(&dir)
                .map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Cannot open partial object in {}: {}",
                        dir.display(),
                        e
                    ))
                })?;

            let mut file = fs::File::from_std(partial.reopen()?);

            let written = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Copying upload into {} failed: {}",
                    partial.path().display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Flushing {} to disk failed: {}",
                    partial.path().display(),
                    e
                ))
            })?;
            drop(file);

            partial.persist(&path).map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Moving upload into place at {} failed: {}",
                    path.display(),
                    e.error
                ))
            })?;

            Ok::<u64, StorageError>(written)
        }
        .await;

        let written = match result {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    key = %storage_key,
                    duration_ms = started.elapsed().as_millis(),
                    "Writing media object to disk failed"
                );
                return Err(e);
            }
        };

        let url = self.public_url(storage_key);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = written,
            duration_ms = started.elapsed().as_millis(),
            "Media object written to disk"
        );

        Ok(url)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(storage_key)?;

        match fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Reading {} failed: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.object_path(storage_key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %storage_key, "Media object removed from disk");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Removing {} failed: {}",
                    path.display(),
                    e
                )))
            }
        }

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.object_path(storage_key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
