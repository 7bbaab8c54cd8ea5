use async_trait::async_trait;
use bytes::Bytes;
use packsmith_publisher::{ProgressObserver, ProgressSnapshot};
use packsmith_storage::{
    ByteStream, FilesystemBackend, ObjectHead, ObjectStore, PutOptions, StorageError,
    StorageResult,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Filesystem-backed store that records every write and can inject failures.
#[allow(dead_code)]
pub struct InstrumentedBackend {
    inner: FilesystemBackend,
    writes: Mutex<Vec<String>>,
    lookups: AtomicUsize,
    transient_failures: AtomicUsize,
    fail_suffix: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl InstrumentedBackend {
    pub async fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: FilesystemBackend::new(root).await.unwrap(),
            writes: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
            transient_failures: AtomicUsize::new(0),
            fail_suffix: Mutex::new(None),
        })
    }

    /// Fail the next `count` blob writes with a retryable error.
    pub fn fail_transiently(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Permanently fail every write whose key ends with `suffix`.
    pub fn fail_writes_ending_with(&self, suffix: &str) {
        *self.fail_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    /// Keys successfully written, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn blob_writes(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|key| !key.starts_with("stable/"))
            .collect()
    }

    pub fn manifest_writes(&self) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|key| key.starts_with("stable/"))
            .collect()
    }

    /// Number of `exists` and `head` requests.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn before_write(&self, key: &str) -> StorageResult<()> {
        if let Some(suffix) = self.fail_suffix.lock().unwrap().as_deref()
            && key.ends_with(suffix)
        {
            return Err(StorageError::Config(format!(
                "injected permanent failure for {key}"
            )));
        }
        if !key.starts_with("stable/")
            && self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StorageError::Transient(format!(
                "injected transient failure for {key}"
            )));
        }
        Ok(())
    }

    fn record(&self, key: &str) {
        self.writes.lock().unwrap().push(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for InstrumentedBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.head(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<Option<ByteStream>> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()> {
        self.before_write(key)?;
        self.inner.put(key, data, options).await?;
        self.record(key);
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, options: PutOptions) -> StorageResult<()> {
        self.before_write(key)?;
        self.inner.put_file(key, path, options).await?;
        self.record(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

/// Observer that counts callbacks.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingObserver {
    pub progress_calls: AtomicUsize,
    pub completions: AtomicUsize,
    pub completed_total: AtomicUsize,
}

impl ProgressObserver for CountingObserver {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, total: usize) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.completed_total.store(total, Ordering::SeqCst);
    }
}
