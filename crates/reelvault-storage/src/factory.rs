#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use reelvault_core::Config;
use std::sync::Arc;

#[cfg(any(feature = "storage-s3", feature = "storage-local"))]
fn required(setting: &str, backend: &str) -> StorageError {
    StorageError::ConfigError(format!("{} is required for the {} backend", setting, backend))
}

/// Build the object backend named by `STORAGE_BACKEND`.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .clone()
                .ok_or_else(|| required("S3_BUCKET", "s3"))?;
            let region = config
                .s3_region()
                .map(String::from)
                .ok_or_else(|| required("S3_REGION or AWS_REGION", "s3"))?;
            let endpoint = config.storage.s3_endpoint.clone();

            let storage = S3Storage::new(
                bucket,
                region,
                endpoint,
                config.ingest.upload_part_size_bytes,
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "this build has no s3 backend; enable the storage-s3 feature".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config
                .storage
                .local_storage_path
                .clone()
                .ok_or_else(|| required("LOCAL_STORAGE_PATH", "local"))?;
            let base_url = config
                .storage
                .local_storage_base_url
                .clone()
                .ok_or_else(|| required("LOCAL_STORAGE_BASE_URL", "local"))?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "this build has no local backend; enable the storage-local feature".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_creates_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("STORAGE_BACKEND", "local".to_string()),
            ("LOCAL_STORAGE_PATH", dir.path().display().to_string()),
            ("LOCAL_STORAGE_BASE_URL", "http://localhost:8091/assets".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert_eq!(
            storage.public_url("landscape/abc"),
            "http://localhost:8091/assets/landscape/abc"
        );
    }

    #[tokio::test]
    async fn test_missing_local_path_is_config_error() {
        let vars: HashMap<&str, String> = HashMap::from([("STORAGE_BACKEND", "local".to_string())]);
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
