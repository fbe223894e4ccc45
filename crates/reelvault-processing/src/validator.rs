/// Validation errors for uploaded files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: more than {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("Unsupported content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedFormat {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Empty file")]
    EmptyFile,
}

/// Video uploads must be MP4: the fast-start rewrite targets that container.
pub const VIDEO_CONTENT_TYPES: &[&str] = &["video/mp4"];

pub const THUMBNAIL_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Strip parameters and normalise a declared media type.
///
/// `"Video/MP4; codecs=avc1"` becomes `"video/mp4"`. Returns `None` when the value
/// is not of the form `type/subtype`.
pub fn parse_media_type(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or_default().trim().to_lowercase();
    let (kind, subtype) = essence.split_once('/')?;

    let is_token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };

    if is_token(kind) && is_token(subtype) {
        Some(essence)
    } else {
        None
    }
}

/// File extension used for a stored object of this media type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "video/mp4" => Some("mp4"),
        "image/jpeg" => Some("jpeg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Media file validator
///
/// Checks the client-declared content type against an allow-list and the buffered
/// size against a cap.
pub struct MediaValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
}

impl MediaValidator {
    pub fn new(max_file_size: u64, allowed_content_types: &[&str]) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn for_videos(max_file_size: u64) -> Self {
        Self::new(max_file_size, VIDEO_CONTENT_TYPES)
    }

    pub fn for_thumbnails(max_file_size: u64) -> Self {
        Self::new(max_file_size, THUMBNAIL_CONTENT_TYPES)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate the declared content type and return its normalised form
    pub fn validate_content_type(&self, content_type: &str) -> Result<String, ValidationError> {
        let unsupported = || ValidationError::UnsupportedFormat {
            content_type: content_type.to_string(),
            allowed: self.allowed_content_types.clone(),
        };

        let normalized = parse_media_type(content_type).ok_or_else(unsupported)?;

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(unsupported());
        }

        Ok(normalized)
    }
}
