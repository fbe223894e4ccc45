use chrono::Utc;
use reelvault_core::{
    AspectClassification, ErrorMetadata, IngestConfig, LogLevel, MediaRecord, MediaRecordStore,
    MediaReference, StorageKey,
};
use reelvault_storage::{derive_storage_key, derive_thumbnail_key, Storage};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{IngestError, IngestFailure, IngestStage};
use crate::inspector::{FfprobeInspector, MediaInspector, VideoDimensions};
use crate::process::ToolError;
use crate::rewriter::{FfmpegRewriter, StreamRewriter};
use crate::scratch::ScratchSpace;
use crate::validator::{extension_for, MediaValidator, ValidationError};

type UploadBody = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// An incoming video for an existing media record
pub struct VideoUpload {
    pub record_id: Uuid,
    /// Content type as declared by the client
    pub content_type: String,
    pub body: UploadBody,
}

impl VideoUpload {
    pub fn new(
        record_id: Uuid,
        content_type: impl Into<String>,
        body: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            record_id,
            content_type: content_type.into(),
            body: Box::pin(body),
        }
    }
}

/// An incoming thumbnail image for an existing media record
pub struct ThumbnailUpload {
    pub record_id: Uuid,
    pub content_type: String,
    pub body: UploadBody,
}

impl ThumbnailUpload {
    pub fn new(
        record_id: Uuid,
        content_type: impl Into<String>,
        body: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            record_id,
            content_type: content_type.into(),
            body: Box::pin(body),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The record as written back, with `video_url` set
    pub record: MediaRecord,
    pub key: StorageKey,
    pub reference: MediaReference,
    pub classification: AspectClassification,
    pub dimensions: VideoDimensions,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ThumbnailOutcome {
    /// The record as written back, with `thumbnail_url` set
    pub record: MediaRecord,
    pub key: StorageKey,
    pub reference: MediaReference,
    pub size_bytes: u64,
}

impl From<ValidationError> for IngestFailure {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { max } => IngestFailure::PayloadTooLarge { limit: max },
            ValidationError::EmptyFile => IngestFailure::EmptyUpload,
            ValidationError::UnsupportedFormat { content_type, .. } => {
                IngestFailure::UnsupportedFormat { content_type }
            }
        }
    }
}

/// Drive one stage, giving up as soon as `cancel` fires.
///
/// Dropping the stage future on cancellation kills any child process it owns.
async fn run_stage<T, F>(
    cancel: &CancellationToken,
    stage: IngestStage,
    fut: F,
) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, IngestFailure>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IngestError::new(stage, IngestFailure::Cancelled)),
        result = fut => result.map_err(|cause| IngestError::new(stage, cause)),
    }
}

/// Copy the upload body into `path`, reading at most one byte past the cap.
async fn buffer_to_file(
    body: UploadBody,
    path: &Path,
    validator: &MediaValidator,
) -> Result<u64, IngestFailure> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut limited = body.take(validator.max_file_size().saturating_add(1));

    let size = tokio::io::copy(&mut limited, &mut file).await?;
    file.flush().await?;

    validator.validate_file_size(size)?;
    Ok(size)
}

fn log_failure(err: &IngestError, record_id: Uuid) {
    let error_code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            error = %err,
            record_id = %record_id,
            stage = %err.stage,
            error_code,
            "Ingestion failed"
        ),
        LogLevel::Warn => tracing::warn!(
            error = %err,
            record_id = %record_id,
            stage = %err.stage,
            error_code,
            "Ingestion failed"
        ),
        LogLevel::Error => tracing::error!(
            error = %err,
            record_id = %record_id,
            stage = %err.stage,
            error_code,
            "Ingestion failed"
        ),
    }
}

/// Runs uploads through buffer, validation, inspection, fast-start rewrite, key
/// derivation, durable storage and the record update.
///
/// Holds only immutable configuration and shared collaborators; share it across
/// tasks behind an `Arc`. Runs are independent of each other.
pub struct IngestionOrchestrator {
    config: IngestConfig,
    video_validator: MediaValidator,
    thumbnail_validator: MediaValidator,
    inspector: Arc<dyn MediaInspector>,
    rewriter: Arc<dyn StreamRewriter>,
    storage: Arc<dyn Storage>,
    records: Arc<dyn MediaRecordStore>,
}

impl IngestionOrchestrator {
    pub fn new(
        config: IngestConfig,
        inspector: Arc<dyn MediaInspector>,
        rewriter: Arc<dyn StreamRewriter>,
        storage: Arc<dyn Storage>,
        records: Arc<dyn MediaRecordStore>,
    ) -> Self {
        let video_validator = MediaValidator::for_videos(config.max_video_size_bytes);
        let thumbnail_validator = MediaValidator::for_thumbnails(config.max_thumbnail_size_bytes);

        Self {
            config,
            video_validator,
            thumbnail_validator,
            inspector,
            rewriter,
            storage,
            records,
        }
    }

    /// Build an orchestrator using the ffprobe and ffmpeg binaries named in `config`.
    pub fn from_config(
        config: IngestConfig,
        storage: Arc<dyn Storage>,
        records: Arc<dyn MediaRecordStore>,
    ) -> Result<Self, ToolError> {
        let inspector = FfprobeInspector::new(config.ffprobe_path.clone(), config.probe_timeout)?;
        let rewriter = FfmpegRewriter::new(config.ffmpeg_path.clone(), config.rewrite_timeout)?;

        Ok(Self::new(
            config,
            Arc::new(inspector),
            Arc::new(rewriter),
            storage,
            records,
        ))
    }

    /// Ingest a video and attach it to its media record.
    #[tracing::instrument(skip(self, upload, cancel), fields(
        record_id = %upload.record_id,
        content_type = %upload.content_type
    ))]
    pub async fn ingest_video(
        &self,
        upload: VideoUpload,
        cancel: CancellationToken,
    ) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let record_id = upload.record_id;

        let result = self.run_video(upload, &cancel).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    record_id = %record_id,
                    key = %outcome.key,
                    classification = %outcome.classification,
                    width = outcome.dimensions.width,
                    height = outcome.dimensions.height,
                    size_bytes = outcome.size_bytes,
                    duration_ms = start.elapsed().as_millis(),
                    "Video ingested"
                );
            }
            Err(e) => log_failure(e, record_id),
        }

        result
    }

    async fn run_video(
        &self,
        upload: VideoUpload,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, IngestError> {
        let VideoUpload {
            record_id,
            content_type,
            body,
        } = upload;

        let mut record =
            run_stage(cancel, IngestStage::Received, self.fetch_record(record_id)).await?;

        let scratch = self.create_scratch()?;
        let upload_path = scratch.file_path("upload.mp4");

        let size_bytes = run_stage(
            cancel,
            IngestStage::Buffered,
            buffer_to_file(body, &upload_path, &self.video_validator),
        )
        .await?;
        tracing::debug!(size_bytes, "Upload buffered");

        let content_type = run_stage(cancel, IngestStage::Validated, async {
            Ok::<_, IngestFailure>(self.video_validator.validate_content_type(&content_type)?)
        })
        .await?;

        let dimensions = run_stage(cancel, IngestStage::Inspected, async {
            Ok::<_, IngestFailure>(self.inspector.inspect(&upload_path).await?)
        })
        .await?;
        let classification = dimensions.classification();
        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            classification = %classification,
            "Video inspected"
        );

        let rewritten_path = run_stage(cancel, IngestStage::Rewritten, async {
            Ok::<_, IngestFailure>(self.rewriter.rewrite(&upload_path).await?)
        })
        .await?;

        let key = run_stage(cancel, IngestStage::KeyDerived, async {
            Ok::<_, IngestFailure>(derive_storage_key(classification)?)
        })
        .await?;

        let url = run_stage(cancel, IngestStage::Stored, async {
            Ok::<_, IngestFailure>(self
                .storage
                .put_file(key.as_str(), &rewritten_path, &content_type)
                .await?)
        })
        .await?;
        let reference = MediaReference::new(url);

        record.video_url = Some(reference.to_string());
        record.updated_at = Utc::now();
        self.finalize(cancel, &record, &key).await?;

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Failed to remove scratch directory");
        }

        Ok(IngestOutcome {
            record,
            key,
            reference,
            classification,
            dimensions,
            size_bytes,
        })
    }

    /// Ingest a thumbnail image and attach it to its media record.
    #[tracing::instrument(skip(self, upload, cancel), fields(
        record_id = %upload.record_id,
        content_type = %upload.content_type
    ))]
    pub async fn ingest_thumbnail(
        &self,
        upload: ThumbnailUpload,
        cancel: CancellationToken,
    ) -> Result<ThumbnailOutcome, IngestError> {
        let start = Instant::now();
        let record_id = upload.record_id;

        let result = self.run_thumbnail(upload, &cancel).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    record_id = %record_id,
                    key = %outcome.key,
                    size_bytes = outcome.size_bytes,
                    duration_ms = start.elapsed().as_millis(),
                    "Thumbnail ingested"
                );
            }
            Err(e) => log_failure(e, record_id),
        }

        result
    }

    async fn run_thumbnail(
        &self,
        upload: ThumbnailUpload,
        cancel: &CancellationToken,
    ) -> Result<ThumbnailOutcome, IngestError> {
        let ThumbnailUpload {
            record_id,
            content_type,
            body,
        } = upload;

        let mut record =
            run_stage(cancel, IngestStage::Received, self.fetch_record(record_id)).await?;

        let scratch = self.create_scratch()?;
        let upload_path = scratch.file_path("thumbnail");

        let size_bytes = run_stage(
            cancel,
            IngestStage::Buffered,
            buffer_to_file(body, &upload_path, &self.thumbnail_validator),
        )
        .await?;

        let (content_type, extension) = run_stage(cancel, IngestStage::Validated, async {
            let normalized = self
                .thumbnail_validator
                .validate_content_type(&content_type)
                .map_err(IngestFailure::from)?;
            match extension_for(&normalized) {
                Some(ext) => Ok((normalized, ext)),
                None => Err(IngestFailure::UnsupportedFormat {
                    content_type: normalized,
                }),
            }
        })
        .await?;

        let key = run_stage(cancel, IngestStage::KeyDerived, async {
            Ok::<_, IngestFailure>(derive_thumbnail_key(extension)?)
        })
        .await?;

        let url = run_stage(cancel, IngestStage::Stored, async {
            Ok::<_, IngestFailure>(self
                .storage
                .put_file(key.as_str(), &upload_path, &content_type)
                .await?)
        })
        .await?;
        let reference = MediaReference::new(url);

        record.thumbnail_url = Some(reference.to_string());
        record.updated_at = Utc::now();
        self.finalize(cancel, &record, &key).await?;

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "Failed to remove scratch directory");
        }

        Ok(ThumbnailOutcome {
            record,
            key,
            reference,
            size_bytes,
        })
    }

    async fn fetch_record(&self, record_id: Uuid) -> Result<MediaRecord, IngestFailure> {
        match self.records.fetch(record_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(IngestFailure::RecordNotFound(record_id)),
            Err(e) => Err(IngestFailure::RecordFetch(e)),
        }
    }

    fn create_scratch(&self) -> Result<ScratchSpace, IngestError> {
        ScratchSpace::create(self.config.scratch_dir.as_deref())
            .map_err(|e| IngestError::new(IngestStage::Buffered, IngestFailure::Io(e)))
    }

    /// Write the record back once. If that fails, the stored object is orphaned and
    /// is deleted in the background.
    async fn finalize(
        &self,
        cancel: &CancellationToken,
        record: &MediaRecord,
        key: &StorageKey,
    ) -> Result<(), IngestError> {
        let result = run_stage(cancel, IngestStage::Finalized, async {
            self.records
                .update(record)
                .await
                .map_err(IngestFailure::RecordUpdate)
        })
        .await;

        if let Err(ref e) = result {
            if !e.is_cancelled() {
                let storage = self.storage.clone();
                let storage_key = key.to_string();
                tokio::spawn(async move {
                    if let Err(cleanup_err) = storage.delete(&storage_key).await {
                        tracing::debug!(
                            error = %cleanup_err,
                            storage_key = %storage_key,
                            "Failed to cleanup stored object after record update error"
                        );
                    }
                });
            }
        }

        result
    }
}
