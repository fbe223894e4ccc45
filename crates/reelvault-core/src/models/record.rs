use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media record owned by the metadata store.
///
/// The ingestion pipeline only ever writes `video_url` and `thumbnail_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(owner_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            video_url: None,
            thumbnail_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
