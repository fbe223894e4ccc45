//! Per-request scratch space.
//!
//! Every temporary file of one ingestion lives in a private directory that is
//! removed when the `ScratchSpace` is dropped: on success, on error, and when the
//! request future is cancelled mid-stage.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREFIX: &str = "reelvault-";

pub struct ScratchSpace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchSpace {
    /// Create a fresh directory under `parent`, or under the system temp dir.
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a named file inside the scratch directory
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now and report failures.
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove scratch directory"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_space_is_removed() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchSpace::create(Some(parent.path())).unwrap();
            std::fs::write(scratch.file_path("upload.mp4"), b"data").unwrap();
            std::fs::write(scratch.file_path("faststart.mp4"), b"data").unwrap();
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_close_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::create(Some(parent.path())).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(scratch.file_path("upload.mp4"), b"data").unwrap();

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_spaces_are_unique() {
        let parent = tempfile::tempdir().unwrap();
        let a = ScratchSpace::create(Some(parent.path())).unwrap();
        let b = ScratchSpace::create(Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PREFIX)));
    }

    #[test]
    fn test_missing_parent_is_created() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("scratch").join("videos");
        let scratch = ScratchSpace::create(Some(&nested)).unwrap();
        assert!(scratch.path().starts_with(&nested));
    }
}
