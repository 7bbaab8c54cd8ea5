//! Configuration types shared across crates.

use crate::compression::FileClass;
use crate::layout::{DownloadBase, validate_segment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything one publish run needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Object store the blobs and manifests are written to.
    pub storage: StorageConfig,
    /// Public base URL the store is served from.
    pub download_url: String,
    /// Project id; becomes a key segment under `stable/`.
    pub project_id: String,
    /// Root of the files shipped to every side.
    pub source_dir: PathBuf,
    /// Optional root of server-only files.
    #[serde(default)]
    pub server_dir: Option<PathBuf>,
    /// Optional root of client-only files.
    #[serde(default)]
    pub client_dir: Option<PathBuf>,
    /// Name of the version being published.
    pub version_name: String,
    /// Library id to version, recorded in the modpack manifest.
    #[serde(default)]
    pub libraries: BTreeMap<String, String>,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl PublishConfig {
    /// Validate every field that can be checked without touching the network.
    pub fn validate(&self) -> crate::Result<()> {
        self.storage.validate().map_err(crate::Error::Config)?;
        DownloadBase::parse(&self.download_url)?;
        validate_segment("project_id", &self.project_id)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        validate_segment("version_name", &self.version_name)
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        for (field, dir) in self.source_roots_with_names() {
            if !dir.is_dir() {
                return Err(crate::Error::Config(format!(
                    "{field} is not a directory: {}",
                    dir.display()
                )));
            }
        }

        self.upload.validate()
    }

    fn source_roots_with_names(&self) -> Vec<(&'static str, &PathBuf)> {
        let mut roots = vec![("source_dir", &self.source_dir)];
        if let Some(dir) = &self.server_dir {
            roots.push(("server_dir", dir));
        }
        if let Some(dir) = &self.client_dir {
            roots.push(("client_dir", dir));
        }
        roots
    }

    /// Template written by `packsmith --init`.
    pub fn template() -> Self {
        let mut libraries = BTreeMap::new();
        libraries.insert("net.minecraft".to_string(), "1.20.1".to_string());
        libraries.insert("net.minecraftforge".to_string(), "47.4.0".to_string());
        Self {
            storage: StorageConfig::S3 {
                bucket: "my-bucket".to_string(),
                endpoint: None,
                region: Some("us-east-1".to_string()),
                prefix: None,
                access_key_id: None,
                secret_access_key: None,
                force_path_style: false,
            },
            download_url: "https://cdn.example.com".to_string(),
            project_id: "my-modpack".to_string(),
            source_dir: PathBuf::from("./pack"),
            server_dir: None,
            client_dir: None,
            version_name: "1.0.0".to_string(),
            libraries,
            upload: UploadConfig::default(),
        }
    }
}

/// Tuning for the upload stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum concurrent per-file tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Extra attempts after the first one fails with a transient error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff; the n-th retry waits `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub hash_normalization: HashNormalization,
}

fn default_concurrency() -> usize {
    crate::DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    crate::DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    crate::DEFAULT_RETRY_BACKOFF_MS
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            hash_normalization: HashNormalization::default(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.concurrency == 0 {
            return Err(crate::Error::Config(
                "upload.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which files get whitespace stripped before fingerprinting.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashNormalization {
    /// Every file, binaries included. Keeps fingerprints compatible with
    /// blobs already in the store.
    #[default]
    All,
    /// Only files on the text allowlist.
    Text,
    /// No file; fingerprints are plain SHA-256.
    None,
}

impl HashNormalization {
    pub fn applies_to(self, class: FileClass) -> bool {
        match self {
            Self::All => true,
            Self::Text => class == FileClass::Text,
            Self::None => false,
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage (AWS, MinIO, COS through its S3 endpoint).
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL for non-AWS services.
        endpoint: Option<String>,
        /// Region; defaults to us-east-1.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// Access key id. Falls back to the ambient AWS credential chain if unset.
        /// Prefer `PACKSMITH_STORAGE__ACCESS_KEY_ID` over storing secrets in files.
        access_key_id: Option<String>,
        /// Secret access key. Same fallback as `access_key_id`.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("s3 config requires a bucket name".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err("filesystem storage requires a path".to_string());
                }
                Ok(())
            }
        }
    }
}
