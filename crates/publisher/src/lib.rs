//! Publishing pipeline for packsmith.
//!
//! A publish walks the source directories, uploads every file as a
//! content-addressed blob (skipping blobs already stored), then commits the
//! modpack, version index and latest-version manifests in that order.

pub mod compress;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod manifest;
pub mod progress;
pub mod publisher;
pub mod retry;
pub mod upload;
pub mod walker;

pub use error::{ManifestDocument, ManifestError, PublishError, UploadTaskError};
pub use guard::VersionGuard;
pub use manifest::{ManifestPublisher, PublishedManifests, format_version_date};
pub use progress::{ProgressObserver, ProgressSnapshot, ProgressTracker};
pub use publisher::{PublishReport, Publisher};
pub use retry::{RetryOutcome, RetryPolicy, Retryable};
pub use upload::{UploadOrchestrator, UploadOutcome, UploadSettings, UploadSummary};
pub use walker::{SourceRoot, SourceWalker, collect_sources};
