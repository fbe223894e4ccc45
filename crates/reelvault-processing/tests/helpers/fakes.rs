//! In-process stand-ins for the prober, remuxer, object store and record store.

use async_trait::async_trait;
use reelvault_core::{InMemoryRecordStore, MediaRecord, MediaRecordStore, RecordStoreError};
use reelvault_processing::{
    InspectError, MediaInspector, RewriteError, StreamRewriter, VideoDimensions,
};
use reelvault_storage::{LocalStorage, Storage, StorageBackend, StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum ProbeBehavior {
    Dimensions(u32, u32),
    Fail,
    Hang,
}

pub struct FakeInspector {
    behavior: ProbeBehavior,
    calls: AtomicUsize,
    inspected: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    pub fn new(behavior: ProbeBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            inspected: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inspected_paths(&self) -> Vec<PathBuf> {
        self.inspected.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaInspector for FakeInspector {
    async fn inspect(&self, path: &Path) -> Result<VideoDimensions, InspectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inspected.lock().unwrap().push(path.to_path_buf());

        match self.behavior {
            ProbeBehavior::Dimensions(width, height) => Ok(VideoDimensions { width, height }),
            ProbeBehavior::Fail => Err(InspectError::ProbeFailure {
                status: "exit status: 1".to_string(),
                stderr: "moov atom not found".to_string(),
            }),
            ProbeBehavior::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RewriteBehavior {
    /// Copy the input next to itself, prefixed with a marker
    Copy,
    Fail,
    Hang,
}

pub const FASTSTART_MARKER: &[u8] = b"FASTSTART:";

pub struct FakeRewriter {
    behavior: RewriteBehavior,
    calls: AtomicUsize,
}

impl FakeRewriter {
    pub fn new(behavior: RewriteBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamRewriter for FakeRewriter {
    async fn rewrite(&self, input: &Path) -> Result<PathBuf, RewriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            RewriteBehavior::Copy => {
                let output = input.with_file_name(format!("faststart-{}.mp4", Uuid::new_v4()));
                let mut data = FASTSTART_MARKER.to_vec();
                data.extend(tokio::fs::read(input).await.unwrap());
                tokio::fs::write(&output, data).await.unwrap();
                Ok(output)
            }
            RewriteBehavior::Fail => Err(RewriteError::RewriteFailure {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }),
            RewriteBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Upload body that never yields another byte.
struct Stalled;

impl AsyncRead for Stalled {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}

/// Bytes let through before a stalled upload stops making progress
pub const STALL_AFTER_BYTES: u64 = 512;

/// Local disk storage that records every upload and can be told to fail them.
pub struct CountingStorage {
    inner: LocalStorage,
    puts: Mutex<Vec<(String, String)>>,
    deletes: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    stall_puts: AtomicBool,
}

impl CountingStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_puts: AtomicBool::new(false),
            stall_puts: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    /// Uploads pass their first bytes to disk and then hang until dropped.
    pub fn stall_puts(&self) {
        self.stall_puts.store(true, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    /// (key, content type) of every upload attempt
    pub fn puts(&self) -> Vec<(String, String)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn put_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        self.puts
            .lock()
            .unwrap()
            .push((storage_key.to_string(), content_type.to_string()));

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("store unreachable".to_string()));
        }
        if self.stall_puts.load(Ordering::SeqCst) {
            let stalled = reader.take(STALL_AFTER_BYTES).chain(Stalled);
            return self
                .inner
                .put_stream(storage_key, content_type, Box::pin(stalled))
                .await;
        }
        self.inner.put_stream(storage_key, content_type, reader).await
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.inner.download(storage_key).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.deletes.lock().unwrap().push(storage_key.to_string());
        self.inner.delete(storage_key).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    fn public_url(&self, storage_key: &str) -> String {
        self.inner.public_url(storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

/// In-memory record store that counts updates and can be told to fail them.
#[derive(Default)]
pub struct FlakyRecordStore {
    inner: InMemoryRecordStore,
    updates: AtomicUsize,
    fail_updates: AtomicBool,
}

impl FlakyRecordStore {
    pub async fn insert(&self, record: MediaRecord) {
        self.inner.insert(record).await;
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaRecordStore for FlakyRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<MediaRecord>, RecordStoreError> {
        self.inner.fetch(id).await
    }

    async fn update(&self, record: &MediaRecord) -> Result<(), RecordStoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.update(record).await
    }
}
