//! Media inspection: frame dimensions via ffprobe.

use async_trait::async_trait;
use reelvault_core::AspectClassification;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::process::{run_tool, stderr_tail, validate_tool_path, ToolError};

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("ffprobe failed ({status}): {stderr}")]
    ProbeFailure { status: String, stderr: String },

    #[error("Could not parse ffprobe output: {0}")]
    ParseFailure(String),

    #[error("No video stream found")]
    NoStreamFound,

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Pixel dimensions of the first video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    pub fn classification(&self) -> AspectClassification {
        AspectClassification::from_dimensions(self.width, self.height)
    }
}

/// Reads the encoded layout of a media file.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> Result<VideoDimensions, InspectError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Parse `ffprobe -print_format json -show_streams` output.
///
/// Audio and data streams carry no dimensions and are skipped; the first stream
/// with both a width and a height wins.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoDimensions, InspectError> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| InspectError::ParseFailure(e.to_string()))?;

    let stream = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref().map_or(true, |t| t == "video"))
        .find(|s| s.width.is_some() && s.height.is_some())
        .ok_or(InspectError::NoStreamFound)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => {
            Ok(VideoDimensions { width, height })
        }
        (width, height) => Err(InspectError::ParseFailure(format!(
            "invalid frame size {:?}x{:?}",
            width, height
        ))),
    }
}

/// `MediaInspector` backed by the ffprobe binary
pub struct FfprobeInspector {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: String, timeout: Duration) -> Result<Self, ToolError> {
        validate_tool_path(&ffprobe_path)?;
        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn inspect(&self, path: &Path) -> Result<VideoDimensions, InspectError> {
        let start = std::time::Instant::now();

        let mut command = Command::new(&self.ffprobe_path);
        command
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path);

        let output = run_tool("ffprobe", command, self.timeout).await?;

        if !output.status.success() {
            return Err(InspectError::ProbeFailure {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }

        let dimensions = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            width = dimensions.width,
            height = dimensions.height,
            "Video probe completed"
        );

        Ok(dimensions)
    }
}
