//! Fast-start remux: moves the `moov` atom ahead of the media data.
//!
//! Streams are copied, never re-encoded, so the cost is one sequential read and
//! one sequential write of the file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

use crate::process::{run_tool, stderr_tail, validate_tool_path, ToolError};

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("ffmpeg failed ({status}): {stderr}")]
    RewriteFailure { status: String, stderr: String },

    #[error("ffmpeg produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Produces a fast-start copy of a video file.
///
/// The returned path is new; both files belong to the caller.
#[async_trait]
pub trait StreamRewriter: Send + Sync {
    async fn rewrite(&self, input: &Path) -> Result<PathBuf, RewriteError>;
}

/// `StreamRewriter` backed by the ffmpeg binary
pub struct FfmpegRewriter {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegRewriter {
    pub fn new(ffmpeg_path: String, timeout: Duration) -> Result<Self, ToolError> {
        validate_tool_path(&ffmpeg_path)?;
        Ok(Self {
            ffmpeg_path,
            timeout,
        })
    }

    /// Fresh sibling of `input` for the rewritten file
    fn output_path(input: &Path) -> PathBuf {
        input.with_file_name(format!("faststart-{}.mp4", Uuid::new_v4()))
    }
}

#[async_trait]
impl StreamRewriter for FfmpegRewriter {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "faststart"
    ))]
    async fn rewrite(&self, input: &Path) -> Result<PathBuf, RewriteError> {
        let start = std::time::Instant::now();
        let output_path = Self::output_path(input);

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&output_path);

        let output = run_tool("ffmpeg", command, self.timeout).await?;

        if !output.status.success() {
            return Err(RewriteError::RewriteFailure {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }

        let size = match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => return Err(RewriteError::MissingOutput(output_path)),
        };

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            size_bytes = size,
            output = %output_path.display(),
            "Fast-start rewrite completed"
        );

        Ok(output_path)
    }
}
