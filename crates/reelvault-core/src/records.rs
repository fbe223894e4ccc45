//! Metadata store collaborator.
//!
//! The pipeline never owns media records. It reads the owning record before doing
//! any work and writes it back exactly once, after the upload succeeded.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::MediaRecord;

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MediaRecordStore: Send + Sync {
    /// Fetch a record by id; `Ok(None)` when it does not exist.
    async fn fetch(&self, id: Uuid) -> Result<Option<MediaRecord>, RecordStoreError>;

    /// Replace a stored record with `record`.
    async fn update(&self, record: &MediaRecord) -> Result<(), RecordStoreError>;
}

/// Process-local record store, for embedding and tests.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Uuid, MediaRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: MediaRecord) {
        self.records.write().await.insert(record.id, record);
    }
}

#[async_trait]
impl MediaRecordStore for InMemoryRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<MediaRecord>, RecordStoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, record: &MediaRecord) -> Result<(), RecordStoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RecordStoreError::NotFound(record.id)),
        }
    }
}
