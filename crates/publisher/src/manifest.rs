//! Manifest commit protocol.
//!
//! A version becomes visible to clients in three writes, strictly ordered:
//! `modpack.json`, then `versions.json`, then `meta.json`. A failure at any
//! stage stops the sequence, so a client following `meta.json` never sees a
//! version whose modpack manifest is missing.

use crate::error::{ManifestDocument, ManifestError, PublishError};
use packsmith_core::{DownloadBase, ManifestLayout, MetaPointer, Modpack, VersionIndex, VersionRecord};
use packsmith_storage::{ObjectStore, PutOptions, deflate_bytes};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, instrument};

/// Format a publish timestamp as `YYYY-MM-DD hh:mm:ss` in UTC.
pub fn format_version_date(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
}

/// URLs of the documents written by one publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedManifests {
    pub modpack_url: String,
    pub versions_url: String,
    pub meta_url: String,
    /// The record appended to `versions.json`.
    pub record: VersionRecord,
}

/// Reads and writes the manifest documents of one project.
#[derive(Clone)]
pub struct ManifestPublisher {
    store: Arc<dyn ObjectStore>,
    layout: ManifestLayout,
    download: DownloadBase,
}

impl ManifestPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, layout: ManifestLayout, download: DownloadBase) -> Self {
        Self {
            store,
            layout,
            download,
        }
    }

    pub fn layout(&self) -> &ManifestLayout {
        &self.layout
    }

    /// Current version index, or `None` if the project has never been published.
    pub async fn read_version_index(&self) -> Result<Option<VersionIndex>, ManifestError> {
        self.read_document(&self.layout.versions_key()).await
    }

    /// Current latest-version pointer, if any.
    pub async fn read_meta(&self) -> Result<Option<MetaPointer>, ManifestError> {
        self.read_document(&self.layout.meta_key()).await
    }

    /// Publish `modpack` as a new version, stamped with `published_at`.
    #[instrument(skip_all, fields(project = %self.layout.project(), version = %modpack.version()))]
    pub async fn publish(
        &self,
        modpack: &Modpack,
        published_at: OffsetDateTime,
    ) -> Result<PublishedManifests, PublishError> {
        let version = modpack.version();
        let version_date = format_version_date(published_at)
            .map_err(|e| PublishError::manifest(ManifestDocument::Versions, e))?;

        // Reject a known version before touching its modpack.json. The index
        // is checked again right before it is rewritten.
        self.current_index_without(version).await?;

        let modpack_key = self.layout.modpack_key(version);
        self.write_document(&modpack_key, modpack)
            .await
            .map_err(|e| PublishError::manifest(ManifestDocument::Modpack, e))?;
        let modpack_url = self.download.url_for(&modpack_key);
        info!(url = %modpack_url, files = modpack.files().len(), "published modpack manifest");

        let record = VersionRecord::new(
            version,
            version_date,
            modpack_url.clone(),
            self.download.url_for(&self.layout.changelog_key(version)),
        );

        let index = self
            .current_index_without(version)
            .await?
            .appended(record.clone())
            .map_err(|e| self.append_error(e))?;
        let versions_key = self.layout.versions_key();
        self.write_document(&versions_key, &index)
            .await
            .map_err(|e| PublishError::manifest(ManifestDocument::Versions, e))?;
        let versions_url = self.download.url_for(&versions_key);
        info!(url = %versions_url, versions = index.versions().len(), "published version index");

        let meta = MetaPointer::new(versions_url.clone(), record.clone());
        let meta_key = self.layout.meta_key();
        self.write_document(&meta_key, &meta)
            .await
            .map_err(|e| PublishError::manifest(ManifestDocument::Meta, e))?;
        let meta_url = self.download.url_for(&meta_key);
        info!(url = %meta_url, "published latest-version pointer");

        Ok(PublishedManifests {
            modpack_url,
            versions_url,
            meta_url,
            record,
        })
    }

    /// Read the version index, failing if it already lists `version`.
    async fn current_index_without(&self, version: &str) -> Result<VersionIndex, PublishError> {
        let index = self
            .read_version_index()
            .await
            .map_err(|e| PublishError::manifest(ManifestDocument::Versions, e))?
            .unwrap_or_default();
        if index.contains(version) {
            return Err(self.append_error(packsmith_core::Error::DuplicateVersion(
                version.to_string(),
            )));
        }
        Ok(index)
    }

    fn append_error(&self, error: packsmith_core::Error) -> PublishError {
        match error {
            packsmith_core::Error::DuplicateVersion(version) => PublishError::DuplicateVersion {
                project: self.layout.project().to_string(),
                version,
            },
            other => PublishError::from(other),
        }
    }

    async fn read_document<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ManifestError> {
        let Some(bytes) = self.store.get(key).await? else {
            debug!(key, "manifest not present");
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ManifestError::Corrupt(e.to_string()))
    }

    async fn write_document<T: Serialize>(&self, key: &str, document: &T) -> Result<(), ManifestError> {
        let json = serde_json::to_vec_pretty(document)?;
        let body = deflate_bytes(&json).await.map_err(ManifestError::Encode)?;
        self.store.put(key, body, PutOptions::json_manifest()).await?;
        debug!(key, bytes = json.len(), "wrote manifest");
        Ok(())
    }
}
