//! Support code for the `reelvault` command-line tool.

use async_trait::async_trait;
use reelvault_core::{MediaRecord, MediaRecordStore, RecordStoreError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Media records kept in a single JSON file.
///
/// Every write rewrites the whole file through a temporary sibling and a rename,
/// so readers never see a half-written file. Suitable for a single process.
pub struct JsonFileRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> RecordStoreError {
    RecordStoreError::Unavailable(format!("{}: {}", path.display(), e))
}

impl JsonFileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<Uuid, MediaRecord>, RecordStoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(unavailable(&self.path, e)),
        };

        let records: Vec<MediaRecord> =
            serde_json::from_slice(&data).map_err(|e| unavailable(&self.path, e))?;
        Ok(records.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn save(&self, records: HashMap<Uuid, MediaRecord>) -> Result<(), RecordStoreError> {
        let mut records: Vec<MediaRecord> = records.into_values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let data = serde_json::to_vec_pretty(&records).map_err(|e| unavailable(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, e))?;
        }

        let tmp_path = self.path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp_path, &data).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(unavailable(&tmp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(unavailable(&self.path, e));
        }

        Ok(())
    }

    /// Add a new record, replacing any record with the same id.
    pub async fn insert(&self, record: MediaRecord) -> Result<(), RecordStoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.id, record);
        self.save(records).await
    }

    /// All records, oldest first
    pub async fn list(&self) -> Result<Vec<MediaRecord>, RecordStoreError> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<MediaRecord> = self.load().await?.into_values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[async_trait]
impl MediaRecordStore for JsonFileRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<MediaRecord>, RecordStoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&id))
    }

    async fn update(&self, record: &MediaRecord) -> Result<(), RecordStoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        match records.get_mut(&record.id) {
            Some(existing) => *existing = record.clone(),
            None => return Err(RecordStoreError::NotFound(record.id)),
        }
        self.save(records).await
    }
}

/// Content type implied by a file extension, for uploads without `--content-type`.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
