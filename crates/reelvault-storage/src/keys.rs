//! Storage key derivation.
//!
//! Tokens are 32 bytes from the operating system CSPRNG. Collisions are treated as
//! impossible, so keys are never checked against the store before use.

use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use reelvault_core::{AspectClassification, StorageKey};

use crate::traits::StorageError;

const TOKEN_BYTES: usize = 32;
const THUMBNAIL_PREFIX: &str = "thumbnails";

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Random source unavailable: {0}")]
    RandomSourceUnavailable(String),
}

fn random_token() -> Result<[u8; TOKEN_BYTES], KeyError> {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| KeyError::RandomSourceUnavailable(e.to_string()))?;
    Ok(buf)
}

/// Derive `<classification>/<64 hex chars>` for a video.
pub fn derive_storage_key(classification: AspectClassification) -> Result<StorageKey, KeyError> {
    let token = random_token()?;
    Ok(StorageKey::new(classification.prefix(), &hex::encode(token)))
}

/// Derive `thumbnails/<base64url token>.<extension>` for a thumbnail image.
pub fn derive_thumbnail_key(extension: &str) -> Result<StorageKey, KeyError> {
    let token = random_token()?;
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token);
    Ok(StorageKey::new(
        THUMBNAIL_PREFIX,
        &format!("{}.{}", encoded, extension),
    ))
}

/// Reject keys that could escape a bucket or base directory.
pub fn validate_key(storage_key: &str) -> Result<(), StorageError> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_video_key_format() {
        let key = derive_storage_key(AspectClassification::Landscape).unwrap();
        assert_eq!(key.prefix(), "landscape");
        assert_eq!(key.token().len(), 64);
        assert!(key.token().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_video_key_prefix_follows_classification() {
        for class in [
            AspectClassification::Landscape,
            AspectClassification::Portrait,
            AspectClassification::Other,
        ] {
            let key = derive_storage_key(class).unwrap();
            assert_eq!(key.prefix(), class.prefix());
        }
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<String> = (0..1000)
            .map(|_| {
                derive_storage_key(AspectClassification::Other)
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_thumbnail_key_is_url_safe() {
        let key = derive_thumbnail_key("png").unwrap();
        assert_eq!(key.prefix(), "thumbnails");
        let token = key.token();
        assert!(token.ends_with(".png"));
        let encoded = token.trim_end_matches(".png");
        assert_eq!(encoded.len(), 43);
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("landscape/abc").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a\\b").is_err());
    }
}
