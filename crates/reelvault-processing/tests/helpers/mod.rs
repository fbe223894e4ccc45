//! Test helpers: build an orchestrator over fakes, local disk storage and a
//! private scratch root.
//!
//! Run from workspace root: `cargo test -p reelvault-processing`.

#![allow(dead_code)]

pub mod fakes;
pub mod tools;

use fakes::{
    CountingStorage, FakeInspector, FakeRewriter, FlakyRecordStore, ProbeBehavior, RewriteBehavior,
};
use reelvault_core::{IngestConfig, MediaRecord};
use reelvault_processing::IngestionOrchestrator;
use reelvault_storage::LocalStorage;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const BASE_URL: &str = "http://localhost:3000/media";

/// Bytes standing in for an MP4 upload
pub fn sample_video() -> Vec<u8> {
    let mut data = b"\x00\x00\x00\x20ftypisom".to_vec();
    data.extend((0..4096u32).map(|i| (i % 251) as u8));
    data
}

pub struct TestHarness {
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub inspector: Arc<FakeInspector>,
    pub rewriter: Arc<FakeRewriter>,
    pub storage: Arc<CountingStorage>,
    pub records: Arc<FlakyRecordStore>,
    pub scratch_root: PathBuf,
    pub store_root: PathBuf,
    _scratch_dir: TempDir,
    _store_dir: TempDir,
}

impl TestHarness {
    pub async fn new(probe: ProbeBehavior, rewrite: RewriteBehavior) -> Self {
        Self::with_config(probe, rewrite, IngestConfig::default()).await
    }

    pub async fn with_config(
        probe: ProbeBehavior,
        rewrite: RewriteBehavior,
        mut config: IngestConfig,
    ) -> Self {
        let scratch_dir = tempfile::tempdir().expect("Failed to create scratch directory");
        let store_dir = tempfile::tempdir().expect("Failed to create store directory");
        let scratch_root = scratch_dir.path().join("scratch");
        config.scratch_dir = Some(scratch_root.clone());

        let local = LocalStorage::new(store_dir.path(), BASE_URL.to_string())
            .await
            .expect("Failed to create local storage");

        let inspector = Arc::new(FakeInspector::new(probe));
        let rewriter = Arc::new(FakeRewriter::new(rewrite));
        let storage = Arc::new(CountingStorage::new(local));
        let records = Arc::new(FlakyRecordStore::default());

        let orchestrator = Arc::new(IngestionOrchestrator::new(
            config,
            inspector.clone(),
            rewriter.clone(),
            storage.clone(),
            records.clone(),
        ));

        Self {
            orchestrator,
            inspector,
            rewriter,
            storage,
            records,
            scratch_root,
            store_root: store_dir.path().to_path_buf(),
            _scratch_dir: scratch_dir,
            _store_dir: store_dir,
        }
    }

    /// Insert a fresh record and return it
    pub async fn seed_record(&self) -> MediaRecord {
        let record = MediaRecord::new(Uuid::new_v4(), "Test clip");
        self.records.insert(record.clone()).await;
        record
    }

    /// Everything left below the scratch root
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.scratch_root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Every file in the object store, as a path relative to its root
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![self.store_root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path.strip_prefix(&self.store_root).unwrap().to_path_buf());
                }
            }
        }
        files.sort();
        files
    }

    pub fn assert_scratch_empty(&self) {
        let entries = self.scratch_entries();
        assert!(entries.is_empty(), "scratch files survived: {:?}", entries);
    }
}
