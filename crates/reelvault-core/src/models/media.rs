use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

const LANDSCAPE_RATIO: f64 = 16.0 / 9.0;
const PORTRAIT_RATIO: f64 = 9.0 / 16.0;
const RATIO_TOLERANCE: f64 = 0.1;

/// Frame shape of a video, used as the storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClassification {
    Landscape,
    Portrait,
    Other,
}

impl AspectClassification {
    /// Classify a frame by its width/height ratio.
    ///
    /// Within 0.1 of 16:9 is landscape, within 0.1 of 9:16 is portrait, anything
    /// else is other. Landscape is checked first, so it would win a tie; the two
    /// windows are far apart so that cannot happen in practice.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let ratio = width as f64 / height as f64;

        if (ratio - LANDSCAPE_RATIO).abs() < RATIO_TOLERANCE {
            AspectClassification::Landscape
        } else if (ratio - PORTRAIT_RATIO).abs() < RATIO_TOLERANCE {
            AspectClassification::Portrait
        } else {
            AspectClassification::Other
        }
    }

    /// Key prefix for objects of this classification
    pub fn prefix(&self) -> &'static str {
        match self {
            AspectClassification::Landscape => "landscape",
            AspectClassification::Portrait => "portrait",
            AspectClassification::Other => "other",
        }
    }
}

impl Display for AspectClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.prefix())
    }
}

/// Object key of the form `<prefix>/<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(prefix: &str, token: &str) -> Self {
        StorageKey(format!("{}/{}", prefix, token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the first `/`
    pub fn prefix(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Everything after the first `/`
    pub fn token(&self) -> &str {
        self.0.split_once('/').map(|(_, t)| t).unwrap_or_default()
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Publicly resolvable locator of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn new(url: impl Into<String>) -> Self {
        MediaReference(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MediaReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
