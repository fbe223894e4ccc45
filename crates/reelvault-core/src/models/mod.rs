//! Data models for the ingestion pipeline

mod media;
mod record;

pub use media::*;
pub use record::*;
