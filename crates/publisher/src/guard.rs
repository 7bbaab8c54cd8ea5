//! Preflight check that a version name is still free.

use crate::error::{ManifestDocument, ManifestError, PublishError};
use crate::manifest::ManifestPublisher;
use packsmith_core::VersionIndex;
use tracing::{debug, warn};

/// Rejects a publish before anything is written if its version already exists.
pub struct VersionGuard<'a> {
    manifests: &'a ManifestPublisher,
}

impl<'a> VersionGuard<'a> {
    pub fn new(manifests: &'a ManifestPublisher) -> Self {
        Self { manifests }
    }

    /// Check that `version` is not yet published, returning the current index.
    ///
    /// An unreadable `meta.json` is only logged since this publish rewrites it.
    /// An unreadable `versions.json` aborts, because appending to it would
    /// drop the history it holds.
    pub async fn check(&self, version: &str) -> Result<VersionIndex, PublishError> {
        let project = self.manifests.layout().project();

        match self.manifests.read_meta().await {
            Ok(Some(meta)) => debug!(
                project,
                latest = meta.latest_version().version_name(),
                "found latest-version pointer"
            ),
            Ok(None) => debug!(project, "no latest-version pointer yet"),
            Err(ManifestError::Corrupt(reason)) => {
                warn!(project, %reason, "existing meta.json is unreadable and will be replaced")
            }
            Err(e) => return Err(PublishError::manifest(ManifestDocument::Meta, e)),
        }

        let index = self
            .manifests
            .read_version_index()
            .await
            .map_err(|e| PublishError::manifest(ManifestDocument::Versions, e))?
            .unwrap_or_default();

        if index.contains(version) {
            return Err(PublishError::DuplicateVersion {
                project: project.to_string(),
                version: version.to_string(),
            });
        }

        debug!(project, version, existing = index.versions().len(), "version name is free");
        Ok(index)
    }
}
