use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMultipartOptions, Result as ObjectResult,
    WriteMultipart,
};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUFFER_BYTES: usize = 64 * 1024;
const MAX_IN_FLIGHT_PARTS: usize = 4;

/// Bucket-backed object storage over S3 or an S3-compatible endpoint (MinIO, R2).
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    part_size: usize,
}

impl S3Storage {
    /// Bind to `bucket` in `region`. Uploads are split into parts of `part_size` bytes;
    /// a plain `http://` endpoint turns on insecure transport.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        part_size: usize,
    ) -> StorageResult<Self> {
        // Credentials come from the environment (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, ...).
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            part_size,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Public URL for an object.
///
/// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
/// For S3-compatible providers, path-style under the endpoint: `{endpoint}/{bucket}/{key}`.
fn object_url(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

/// A multipart upload that is aborted unless [`PendingUpload::complete`] succeeds.
///
/// Dropping it mid-upload schedules the abort on the current runtime.
struct PendingUpload {
    writer: Option<WriteMultipart>,
    key: String,
}

impl PendingUpload {
    fn new(writer: WriteMultipart, key: &str) -> Self {
        Self {
            writer: Some(writer),
            key: key.to_string(),
        }
    }

    fn writer(&mut self) -> StorageResult<&mut WriteMultipart> {
        self.writer.as_mut().ok_or_else(|| {
            StorageError::UploadFailed(format!("multipart upload for {} already closed", self.key))
        })
    }

    async fn abort(mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                tracing::warn!(error = %e, key = %self.key, "Aborting multipart upload failed");
            }
        }
    }

    /// Wait for every in-flight part, then complete the upload.
    async fn complete(mut self) -> ObjectResult<()> {
        let drained = match self.writer.as_mut() {
            Some(writer) => writer.wait_for_capacity(0).await,
            None => Ok(()),
        };
        if let Err(e) = drained {
            self.abort().await;
            return Err(e);
        }

        match self.writer.take() {
            // `finish` aborts the upload itself when the completion request fails.
            Some(writer) => writer.finish().await.map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let key = std::mem::take(&mut self.key);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = writer.abort().await {
                        tracing::warn!(
                            error = %e,
                            key = %key,
                            "Aborting abandoned multipart upload failed"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    "Abandoned multipart upload left open: no runtime to abort it"
                );
            }
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        let started = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutMultipartOptions {
            attributes,
            ..Default::default()
        };

        let upload = self
            .store
            .put_multipart_opts(&location, options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "Could not open multipart upload for media object"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let mut pending = PendingUpload::new(
            WriteMultipart::new_with_chunk_size(upload, self.part_size),
            storage_key,
        );
        let mut buffer = vec![0u8; READ_BUFFER_BYTES];
        let mut size: u64 = 0;

        loop {
            let read = match reader.read(&mut buffer).await {
                Ok(read) => read,
                Err(e) => {
                    pending.abort().await;
                    return Err(StorageError::UploadFailed(format!(
                        "Upload body read error: {}",
                        e
                    )));
                }
            };

            if read == 0 {
                break;
            }

            let writer = pending.writer()?;
            if let Err(e) = writer.wait_for_capacity(MAX_IN_FLIGHT_PARTS).await {
                pending.abort().await;
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    size_bytes = size,
                    duration_ms = started.elapsed().as_millis(),
                    "Media object part rejected by bucket"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }

            writer.write(&buffer[..read]);
            size += read as u64;
        }

        pending.complete().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = started.elapsed().as_millis(),
                "Completing multipart upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.public_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = started.elapsed().as_millis(),
            "Media object stored in bucket"
        );

        Ok(url)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        let object = self.store.get(&location).await;

        let object = object.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bytes = object
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        let removed: ObjectResult<_> = self.store.delete(&location).await;

        removed.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                "Removing media object from bucket failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            "Media object removed from bucket"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn public_url(&self, storage_key: &str) -> String {
        object_url(
            self.endpoint_url.as_deref(),
            &self.bucket,
            &self.region,
            storage_key,
        )
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_url_format() {
        assert_eq!(
            object_url(None, "tubes", "us-east-2", "landscape/abc"),
            "https://tubes.s3.us-east-2.amazonaws.com/landscape/abc"
        );
    }

    #[test]
    fn test_custom_endpoint_url_format() {
        assert_eq!(
            object_url(
                Some("http://localhost:9000/"),
                "tubes",
                "us-east-1",
                "portrait/abc"
            ),
            "http://localhost:9000/tubes/portrait/abc"
        );
    }

    #[tokio::test]
    async fn test_pending_upload_completes_or_leaves_nothing() {
        let store = object_store::memory::InMemory::new();
        let part_size = 5 * 1024 * 1024;

        let done = Path::from("landscape/done");
        let upload = store
            .put_multipart_opts(&done, PutMultipartOptions::default())
            .await
            .unwrap();
        let mut pending = PendingUpload::new(
            WriteMultipart::new_with_chunk_size(upload, part_size),
            "landscape/done",
        );
        pending.writer().unwrap().write(b"complete");
        pending.complete().await.unwrap();
        let body = store.get(&done).await.unwrap().bytes().await.unwrap();
        assert_eq!(body.as_ref(), b"complete");

        let abandoned = Path::from("landscape/abandoned");
        let upload = store
            .put_multipart_opts(&abandoned, PutMultipartOptions::default())
            .await
            .unwrap();
        let mut pending = PendingUpload::new(
            WriteMultipart::new_with_chunk_size(upload, part_size),
            "landscape/abandoned",
        );
        pending.writer().unwrap().write(b"half an upload");
        drop(pending);
        tokio::task::yield_now().await;

        assert!(matches!(
            store.head(&abandoned).await,
            Err(ObjectStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_build_with_custom_endpoint() {
        let storage = S3Storage::new(
            "tubes".to_string(),
            "us-east-1".to_string(),
            Some("http://localhost:9000".to_string()),
            8 * 1024 * 1024,
        )
        .await
        .unwrap();

        assert_eq!(storage.bucket(), "tubes");
        assert_eq!(storage.backend_type(), StorageBackend::S3);
        assert_eq!(
            storage.public_url("other/xyz"),
            "http://localhost:9000/tubes/other/xyz"
        );
    }
}
