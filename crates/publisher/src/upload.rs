//! Concurrent, deduplicating blob upload.
//!
//! Each source file becomes one task: fingerprint, derive the key, skip the
//! upload if the key already exists, otherwise (optionally deflate and) put.
//! Every task yields a [`FileEntry`], whether or not it uploaded anything.
//! An entry's `compressed` flag describes the blob as stored, which for a
//! shared blob may differ from what the file's own suffix would choose.
//! The first permanent failure aborts the remaining tasks.

use crate::compress::deflate_to_temp;
use crate::error::{PublishError, UploadTaskError};
use crate::fingerprint::fingerprint_file;
use crate::progress::ProgressTracker;
use crate::retry::{RetryOutcome, RetryPolicy};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use packsmith_core::{
    DownloadBase, FileClass, FileEntry, HashNormalization, SourceFile, UploadConfig, blob_key,
};
use packsmith_storage::{ObjectStore, PutOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Tuning for an upload run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadSettings {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub normalization: HashNormalization,
}

impl From<&UploadConfig> for UploadSettings {
    fn from(config: &UploadConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            ),
            normalization: config.hash_normalization,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Result of one per-file task.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub entry: FileEntry,
    /// False when the blob was already stored.
    pub uploaded: bool,
    pub attempts: u32,
}

/// Result of a whole upload run.
#[derive(Clone, Debug, Default)]
pub struct UploadSummary {
    /// One entry per source file, sorted by relative path.
    pub entries: Vec<FileEntry>,
    pub uploaded: usize,
    pub deduplicated: usize,
}

/// State shared by the tasks of one run.
struct TaskContext {
    store: Arc<dyn ObjectStore>,
    download: DownloadBase,
    retry: RetryPolicy,
    normalization: HashNormalization,
    /// Keys already being written in this run.
    claimed: DashMap<String, Claim>,
}

/// The file that owns a blob key in a run, and the encoding it writes.
struct Claim {
    owner: String,
    compressed: bool,
}

/// Runs per-file upload tasks with bounded concurrency.
pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStore>,
    download: DownloadBase,
    settings: UploadSettings,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        download: DownloadBase,
        settings: UploadSettings,
    ) -> Self {
        Self {
            store,
            download,
            settings,
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Upload every file, returning once all tasks finished or one failed.
    pub async fn upload_all(
        &self,
        files: Vec<SourceFile>,
        tracker: Option<Arc<ProgressTracker>>,
    ) -> Result<UploadSummary, PublishError> {
        let concurrency = self.settings.concurrency.max(1);
        let run = Arc::new(TaskContext {
            store: Arc::clone(&self.store),
            download: self.download.clone(),
            retry: self.settings.retry,
            normalization: self.settings.normalization,
            claimed: DashMap::new(),
        });
        let mut outcomes = Vec::with_capacity(files.len());
        let mut in_flight = FuturesUnordered::new();

        for file in files {
            let context = Arc::clone(&run);
            let tracker = tracker.clone();
            in_flight.push(tokio::spawn(async move {
                context.process(file, tracker.as_deref()).await
            }));

            if in_flight.len() >= concurrency
                && let Some(joined) = in_flight.next().await
            {
                match settle(joined) {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        in_flight.iter().for_each(|handle| handle.abort());
                        return Err(e);
                    }
                }
            }
        }

        while let Some(joined) = in_flight.next().await {
            match settle(joined) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    in_flight.iter().for_each(|handle| handle.abort());
                    return Err(e);
                }
            }
        }

        let uploaded = outcomes.iter().filter(|o| o.uploaded).count();
        let deduplicated = outcomes.len() - uploaded;
        let mut entries: Vec<FileEntry> = outcomes.into_iter().map(|o| o.entry).collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        Ok(UploadSummary {
            entries,
            uploaded,
            deduplicated,
        })
    }
}

fn settle(
    joined: Result<Result<UploadOutcome, PublishError>, JoinError>,
) -> Result<UploadOutcome, PublishError> {
    joined.map_err(|e| PublishError::Task(e.to_string()))?
}

impl TaskContext {
    async fn process(
        &self,
        file: SourceFile,
        tracker: Option<&ProgressTracker>,
    ) -> Result<UploadOutcome, PublishError> {
        if let Some(tracker) = tracker {
            tracker.start_upload(file.relative_path());
        }

        let outcome = self
            .retry
            .run(file.relative_path(), |attempt| self.attempt(&file, attempt))
            .await;

        if let Some(tracker) = tracker {
            tracker.complete_upload(file.relative_path());
        }

        match outcome {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Failed { error, attempts } => Err(PublishError::Upload {
                path: file.relative_path().to_string(),
                attempts,
                source: error,
            }),
        }
    }

    async fn attempt(
        &self,
        file: &SourceFile,
        attempt: u32,
    ) -> Result<UploadOutcome, UploadTaskError> {
        let path = file.relative_path();
        let class = FileClass::of(path);
        let fingerprint = fingerprint_file(
            file.absolute_path(),
            self.normalization.applies_to(class),
        )
        .await
        .map_err(UploadTaskError::Hash)?;
        let key = blob_key(&fingerprint);

        let (compressed, uploaded) = if let Some(owner_compressed) =
            self.claim(&key, path, class.is_compressed())
        {
            // A blob stored before this run keeps its encoding.
            let compressed = self
                .store
                .head(&key)
                .await?
                .map_or(owner_compressed, |head| head.is_deflated());
            debug!(path, key = %key, compressed, "blob claimed by another file in this run");
            (compressed, false)
        } else if let Some(head) = self.store.head(&key).await? {
            debug!(path, key = %key, "blob already stored");
            (head.is_deflated(), false)
        } else if class.is_compressed() {
            let temp = deflate_to_temp(file.absolute_path())
                .await
                .map_err(UploadTaskError::Compress)?;
            self.store
                .put_file(&key, temp.path(), PutOptions::blob(true))
                .await?;
            if let Err(e) = temp.close() {
                warn!(path, error = %e, "failed to remove compressed temp file");
            }
            debug!(path, key = %key, attempt, "uploaded deflated blob");
            (true, true)
        } else {
            self.store
                .put_file(&key, file.absolute_path(), PutOptions::blob(false))
                .await?;
            debug!(path, key = %key, attempt, "uploaded blob");
            (false, true)
        };

        let entry = FileEntry::new(
            path,
            fingerprint,
            self.download.url_for(&key),
            file.size(),
            file.dist(),
            compressed,
        );
        Ok(UploadOutcome {
            entry,
            uploaded,
            attempts: attempt,
        })
    }

    /// Claim `key` for `owner`. Returns `None` if `owner` holds the claim,
    /// or the owning file's encoding if another file does.
    fn claim(&self, key: &str, owner: &str, compressed: bool) -> Option<bool> {
        match self.claimed.entry(key.to_string()) {
            Entry::Occupied(existing) if existing.get().owner == owner => None,
            Entry::Occupied(existing) => Some(existing.get().compressed),
            Entry::Vacant(slot) => {
                slot.insert(Claim {
                    owner: owner.to_string(),
                    compressed,
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packsmith_storage::FilesystemBackend;
    use std::path::Path;

    fn source(root: &Path, rel: &str, data: &[u8]) -> SourceFile {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        SourceFile::new(path, rel.to_string(), data.len() as u64, None)
    }

    async fn orchestrator(store_root: &Path) -> (UploadOrchestrator, Arc<FilesystemBackend>) {
        let store = Arc::new(FilesystemBackend::new(store_root).await.unwrap());
        let orchestrator = UploadOrchestrator::new(
            store.clone(),
            DownloadBase::parse("https://cdn.example.com").unwrap(),
            UploadSettings::default(),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_entries_carry_metadata() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (orchestrator, store) = orchestrator(dst.path()).await;

        let files = vec![
            source(src.path(), "config/a.json", b"{ \"a\": 1 }"),
            source(src.path(), "b.png", b"\x89PNG\r\n"),
        ];
        let summary = orchestrator.upload_all(files, None).await.unwrap();

        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.deduplicated, 0);
        let paths: Vec<&str> = summary.entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["b.png", "config/a.json"]);

        let json = &summary.entries[1];
        assert!(json.compressed());
        assert_eq!(json.size(), 10);
        let key = blob_key(json.fingerprint());
        assert_eq!(json.url(), format!("https://cdn.example.com/{key}"));
        assert!(store.exists(&key).await.unwrap());

        let png = &summary.entries[0];
        assert!(!png.compressed());
        assert_eq!(
            store.get(&blob_key(png.fingerprint())).await.unwrap().unwrap().as_ref(),
            b"\x89PNG\r\n"
        );
    }

    #[tokio::test]
    async fn test_identical_files_share_one_blob() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (orchestrator, _store) = orchestrator(dst.path()).await;

        let files = vec![
            source(src.path(), "one/x.dat", b"same content"),
            source(src.path(), "two/y.dat", b"same content"),
        ];
        let summary = orchestrator.upload_all(files, None).await.unwrap();

        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.deduplicated, 1);
        assert_eq!(
            summary.entries[0].fingerprint(),
            summary.entries[1].fingerprint()
        );
    }

    #[tokio::test]
    async fn test_shared_blob_entries_agree_on_encoding() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (orchestrator, store) = orchestrator(dst.path()).await;

        let files = vec![
            source(src.path(), "config/a.json", b"{\"shared\": true}"),
            source(src.path(), "data/b.dat", b"{\"shared\": true}"),
        ];
        let summary = orchestrator.upload_all(files, None).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        let [a, b] = summary.entries.as_slice() else {
            panic!("expected two entries");
        };
        assert_eq!(a.url(), b.url());
        assert_eq!(a.compressed(), b.compressed());
        let head = store.head(&blob_key(a.fingerprint())).await.unwrap().unwrap();
        assert_eq!(a.compressed(), head.is_deflated());
    }

    #[tokio::test]
    async fn test_existing_blob_keeps_stored_encoding() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (orchestrator, store) = orchestrator(dst.path()).await;

        let plain = vec![source(src.path(), "b.dat", b"key=value")];
        let first = orchestrator.upload_all(plain, None).await.unwrap();
        assert!(!first.entries[0].compressed());

        let text = vec![source(src.path(), "a.txt", b"key=value")];
        let second = orchestrator.upload_all(text, None).await.unwrap();
        assert_eq!(second.uploaded, 0);
        let entry = &second.entries[0];
        assert_eq!(entry.url(), first.entries[0].url());
        assert!(!entry.compressed());
        assert_eq!(
            store.get(&blob_key(entry.fingerprint())).await.unwrap().unwrap().as_ref(),
            b"key=value"
        );
    }

    #[tokio::test]
    async fn test_missing_file_fails_with_attempt_count() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemBackend::new(dst.path()).await.unwrap());
        let settings = UploadSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            ..UploadSettings::default()
        };
        let orchestrator = UploadOrchestrator::new(
            store,
            DownloadBase::parse("https://cdn.example.com").unwrap(),
            settings,
        );

        let ghost = SourceFile::new(src.path().join("ghost.txt"), "ghost.txt".into(), 3, None);
        match orchestrator.upload_all(vec![ghost], None).await {
            Err(PublishError::Upload {
                path,
                attempts,
                source: UploadTaskError::Hash(_),
            }) => {
                assert_eq!(path, "ghost.txt");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected upload failure, got {other:?}"),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = UploadConfig {
            concurrency: 0,
            max_retries: 5,
            retry_backoff_ms: 250,
            hash_normalization: HashNormalization::Text,
        };
        let settings = UploadSettings::from(&config);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.delay_for(2), Duration::from_millis(500));
        assert_eq!(settings.normalization, HashNormalization::Text);
    }
}
