//! Manifest documents published alongside the blobs.
//!
//! All types here are immutable values: they are built once with every field
//! populated and never mutated afterwards. Appending to a [`VersionIndex`]
//! produces a new index.

use crate::hash::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which side of the game a file is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Client,
    Server,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// One published file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "file")]
    path: String,
    #[serde(rename = "hash")]
    fingerprint: Fingerprint,
    #[serde(rename = "link")]
    url: String,
    size: u64,
    dist: Option<Distribution>,
    compressed: bool,
}

impl FileEntry {
    pub fn new(
        path: impl Into<String>,
        fingerprint: Fingerprint,
        url: impl Into<String>,
        size: u64,
        dist: Option<Distribution>,
        compressed: bool,
    ) -> Self {
        Self {
            path: path.into(),
            fingerprint,
            url: url.into(),
            size,
            dist,
            compressed,
        }
    }

    /// Slash-separated path relative to the source root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Public download URL of the stored blob.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Size of the original, uncompressed file.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn dist(&self) -> Option<Distribution> {
        self.dist
    }

    /// Whether the blob is stored deflated.
    pub fn compressed(&self) -> bool {
        self.compressed
    }
}

/// The per-version file list (`modpack.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modpack {
    files: Vec<FileEntry>,
    version: String,
    libraries: BTreeMap<String, String>,
}

impl Modpack {
    pub fn new(
        version: impl Into<String>,
        libraries: BTreeMap<String, String>,
        files: Vec<FileEntry>,
    ) -> Self {
        Self {
            files,
            version: version.into(),
            libraries,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn libraries(&self) -> &BTreeMap<String, String> {
        &self.libraries
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }
}

/// One entry of the version index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    version_name: String,
    version_date: String,
    #[serde(rename = "packFilePath")]
    modpack_url: String,
    #[serde(rename = "changelogPath")]
    changelog_url: String,
}

impl VersionRecord {
    pub fn new(
        version_name: impl Into<String>,
        version_date: impl Into<String>,
        modpack_url: impl Into<String>,
        changelog_url: impl Into<String>,
    ) -> Self {
        Self {
            version_name: version_name.into(),
            version_date: version_date.into(),
            modpack_url: modpack_url.into(),
            changelog_url: changelog_url.into(),
        }
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    /// Publish timestamp as `YYYY-MM-DD hh:mm:ss`.
    pub fn version_date(&self) -> &str {
        &self.version_date
    }

    pub fn modpack_url(&self) -> &str {
        &self.modpack_url
    }

    pub fn changelog_url(&self) -> &str {
        &self.changelog_url
    }
}

/// Append-only list of published versions (`versions.json`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIndex {
    versions: Vec<VersionRecord>,
}

impl VersionIndex {
    pub fn new(versions: Vec<VersionRecord>) -> Self {
        Self { versions }
    }

    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    pub fn contains(&self, version_name: &str) -> bool {
        self.versions
            .iter()
            .any(|record| record.version_name == version_name)
    }

    pub fn latest(&self) -> Option<&VersionRecord> {
        self.versions.last()
    }

    /// Return a new index with `record` appended.
    ///
    /// Fails if the version name is already present.
    pub fn appended(&self, record: VersionRecord) -> crate::Result<Self> {
        if self.contains(&record.version_name) {
            return Err(crate::Error::DuplicateVersion(record.version_name));
        }
        let mut versions = Vec::with_capacity(self.versions.len() + 1);
        versions.extend(self.versions.iter().cloned());
        versions.push(record);
        Ok(Self { versions })
    }
}

/// Pointer to the newest version (`meta.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPointer {
    #[serde(rename = "versionsPath")]
    versions_url: String,
    latest_version: VersionRecord,
}

impl MetaPointer {
    pub fn new(versions_url: impl Into<String>, latest_version: VersionRecord) -> Self {
        Self {
            versions_url: versions_url.into(),
            latest_version,
        }
    }

    pub fn versions_url(&self) -> &str {
        &self.versions_url
    }

    pub fn latest_version(&self) -> &VersionRecord {
        &self.latest_version
    }
}
