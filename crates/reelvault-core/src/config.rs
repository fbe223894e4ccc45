//! Configuration module
//!
//! Configuration is read from the process environment (after loading an optional
//! `.env` file) and validated once at startup. Storage settings select and
//! parameterise the object store backend; ingest settings bound the external
//! tools and the scratch space used by the pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage_types::StorageBackend;

// Common constants
const PROBE_TIMEOUT_SECS: u64 = 30;
const REWRITE_TIMEOUT_SECS: u64 = 300;
const MAX_VIDEO_SIZE_MB: usize = 1024;
const MAX_THUMBNAIL_SIZE_MB: usize = 10;
const UPLOAD_PART_SIZE_MB: usize = 8;
// S3 rejects multipart parts below 5 MiB (except the last one)
const MIN_UPLOAD_PART_SIZE_MB: usize = 5;

/// Object store settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, ...)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

/// Pipeline settings: external tools, limits and scratch space
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub probe_timeout: Duration,
    pub rewrite_timeout: Duration,
    pub max_video_size_bytes: u64,
    pub max_thumbnail_size_bytes: u64,
    /// Parent directory for per-request scratch space. `None` means the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub upload_part_size_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            rewrite_timeout: Duration::from_secs(REWRITE_TIMEOUT_SECS),
            max_video_size_bytes: (MAX_VIDEO_SIZE_MB * 1024 * 1024) as u64,
            max_thumbnail_size_bytes: (MAX_THUMBNAIL_SIZE_MB * 1024 * 1024) as u64,
            scratch_dir: None,
            upload_part_size_bytes: UPLOAD_PART_SIZE_MB * 1024 * 1024,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub log_format: String,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from `.env` and the process environment, then validate it.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Missing or empty variables fall back to defaults; malformed numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let parse_u64 = |key: &str, default: u64| -> Result<u64, anyhow::Error> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
                None => Ok(default),
            }
        };

        let backend = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
        };

        // Sizes are configured in MiB and held in bytes.
        let parse_mib = |key: &str, default: usize| -> Result<u64, anyhow::Error> {
            parse_u64(key, default as u64)?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| anyhow::anyhow!("{} is too large", key))
        };

        let ingest = IngestConfig {
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            probe_timeout: Duration::from_secs(parse_u64(
                "PROBE_TIMEOUT_SECS",
                PROBE_TIMEOUT_SECS,
            )?),
            rewrite_timeout: Duration::from_secs(parse_u64(
                "REWRITE_TIMEOUT_SECS",
                REWRITE_TIMEOUT_SECS,
            )?),
            max_video_size_bytes: parse_mib("MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB)?,
            max_thumbnail_size_bytes: parse_mib("MAX_THUMBNAIL_SIZE_MB", MAX_THUMBNAIL_SIZE_MB)?,
            scratch_dir: var("SCRATCH_DIR").map(PathBuf::from),
            upload_part_size_bytes: usize::try_from(parse_mib(
                "UPLOAD_PART_SIZE_MB",
                UPLOAD_PART_SIZE_MB,
            )?)
            .map_err(|_| anyhow::anyhow!("UPLOAD_PART_SIZE_MB is too large"))?,
        };

        Ok(Config {
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_format: var("LOG_FORMAT")
                .unwrap_or_else(|| "text".to_string())
                .to_lowercase(),
            storage,
            ingest,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.storage.s3_region.is_none() && self.storage.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.ingest.probe_timeout.is_zero() || self.ingest.rewrite_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "PROBE_TIMEOUT_SECS and REWRITE_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.ingest.max_video_size_bytes == 0 || self.ingest.max_thumbnail_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_VIDEO_SIZE_MB and MAX_THUMBNAIL_SIZE_MB must be greater than zero"
            ));
        }

        if self.ingest.upload_part_size_bytes < MIN_UPLOAD_PART_SIZE_MB * 1024 * 1024 {
            return Err(anyhow::anyhow!(
                "UPLOAD_PART_SIZE_MB must be at least {}",
                MIN_UPLOAD_PART_SIZE_MB
            ));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'text' or 'json'"));
        }

        Ok(())
    }

    /// Region used for S3 URLs: `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.storage
            .s3_region
            .as_deref()
            .or(self.storage.aws_region.as_deref())
    }
}
