//! Run-scoped publisher service.

use crate::error::PublishError;
use crate::guard::VersionGuard;
use crate::manifest::ManifestPublisher;
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::upload::{UploadOrchestrator, UploadSettings};
use crate::walker::{SourceRoot, collect_sources};
use packsmith_core::{
    DownloadBase, Distribution, HashNormalization, ManifestLayout, Modpack, PublishConfig,
};
use packsmith_storage::ObjectStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{info, warn};

/// What a successful publish produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReport {
    pub project: String,
    pub version: String,
    /// Files listed in the modpack manifest.
    pub files: usize,
    /// Blobs written by this run.
    pub uploaded: usize,
    /// Files whose blob was already stored.
    pub deduplicated: usize,
    pub modpack_url: String,
    pub versions_url: String,
    pub meta_url: String,
    pub elapsed: Duration,
}

/// Owns the storage client for one publishing session.
///
/// Create with [`Publisher::start`], run [`Publisher::publish`], and release
/// the backend with [`Publisher::shutdown`].
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    manifests: ManifestPublisher,
    uploader: UploadOrchestrator,
    roots: Vec<SourceRoot>,
    version: String,
    libraries: BTreeMap<String, String>,
}

impl Publisher {
    /// Validate `config`, connect to the configured store and check that it
    /// is reachable. Nothing is written until [`Publisher::publish`].
    pub async fn start(config: &PublishConfig) -> Result<Self, PublishError> {
        config.validate()?;
        let store = packsmith_storage::from_config(&config.storage).await?;
        store.health_check().await?;
        info!(backend = store.backend_name(), "storage backend ready");
        Self::with_store(store, config)
    }

    /// Build a publisher around an existing store.
    pub fn with_store(store: Arc<dyn ObjectStore>, config: &PublishConfig) -> Result<Self, PublishError> {
        config.validate()?;
        let download = DownloadBase::parse(&config.download_url)?;
        let layout = ManifestLayout::new(config.project_id.clone())?;

        let mut roots = vec![SourceRoot::new(&config.source_dir, None)];
        if let Some(dir) = &config.server_dir {
            roots.push(SourceRoot::new(dir, Some(Distribution::Server)));
        }
        if let Some(dir) = &config.client_dir {
            roots.push(SourceRoot::new(dir, Some(Distribution::Client)));
        }

        Ok(Self {
            manifests: ManifestPublisher::new(Arc::clone(&store), layout, download.clone()),
            uploader: UploadOrchestrator::new(
                Arc::clone(&store),
                download,
                UploadSettings::from(&config.upload),
            ),
            store,
            roots,
            version: config.version_name.clone(),
            libraries: config.libraries.clone(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn project(&self) -> &str {
        self.manifests.layout().project()
    }

    /// Publish the configured source tree as a new version.
    ///
    /// Nothing is written if the version already exists. A failed upload
    /// leaves every manifest untouched, and re-running is always safe.
    pub async fn publish(
        &self,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<PublishReport, PublishError> {
        let started = Instant::now();
        let settings = self.uploader.settings();
        if settings.normalization == HashNormalization::All {
            warn!(
                "whitespace normalization applies to every file; binary files differing \
                 only in whitespace bytes will share a blob"
            );
        }

        VersionGuard::new(&self.manifests).check(&self.version).await?;

        let files = collect_sources(&self.roots).await?;
        info!(
            project = self.project(),
            version = %self.version,
            files = files.len(),
            concurrency = settings.concurrency,
            "uploading source files"
        );

        let tracker = observer.map(|observer| ProgressTracker::new(files.len(), observer));
        if let Some(tracker) = &tracker {
            tracker.start_reporting();
        }
        let uploaded = self.uploader.upload_all(files, tracker.clone()).await;
        if let Some(tracker) = &tracker {
            tracker.stop_reporting();
        }
        let summary = uploaded?;
        info!(
            uploaded = summary.uploaded,
            deduplicated = summary.deduplicated,
            "all files stored"
        );

        let files = summary.entries.len();
        let modpack = Modpack::new(self.version.clone(), self.libraries.clone(), summary.entries);
        let published = self
            .manifests
            .publish(&modpack, OffsetDateTime::now_utc())
            .await?;

        let elapsed = started.elapsed();
        info!(
            version = %self.version,
            elapsed_ms = elapsed.as_millis() as u64,
            meta = %published.meta_url,
            "publish complete"
        );

        Ok(PublishReport {
            project: self.project().to_string(),
            version: self.version.clone(),
            files,
            uploaded: summary.uploaded,
            deduplicated: summary.deduplicated,
            modpack_url: published.modpack_url,
            versions_url: published.versions_url,
            meta_url: published.meta_url,
            elapsed,
        })
    }

    /// Release the storage backend.
    pub async fn shutdown(self) -> Result<(), PublishError> {
        self.store.shutdown().await?;
        info!(backend = self.store.backend_name(), "storage backend shut down");
        Ok(())
    }
}
