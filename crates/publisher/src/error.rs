//! Publisher error types.

use crate::retry::Retryable;
use packsmith_storage::StorageError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which manifest document an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestDocument {
    Modpack,
    Versions,
    Meta,
}

impl fmt::Display for ManifestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modpack => f.write_str("modpack.json"),
            Self::Versions => f.write_str("versions.json"),
            Self::Meta => f.write_str("meta.json"),
        }
    }
}

/// Failure of one attempt of a per-file upload task.
#[derive(Debug, Error)]
pub enum UploadTaskError {
    #[error("failed to read file for hashing: {0}")]
    Hash(#[source] std::io::Error),

    #[error("failed to compress file: {0}")]
    Compress(#[source] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Retryable for UploadTaskError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Hash(_) | Self::Compress(_) => true,
            Self::Storage(e) => e.is_retryable(),
        }
    }
}

/// Failure reading, encoding or writing a manifest document.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to encode: {0}")]
    Encode(#[source] std::io::Error),

    #[error("existing document is unreadable: {0}")]
    Corrupt(String),

    #[error("failed to format publish timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors that abort a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("relative path {0} appears in more than one source directory")]
    DuplicatePath(String),

    #[error("version {version} already exists for project {project}")]
    DuplicateVersion { project: String, version: String },

    #[error("upload of {path} failed after {attempts} attempt(s): {source}")]
    Upload {
        path: String,
        attempts: u32,
        #[source]
        source: UploadTaskError,
    },

    #[error("failed to publish {document}: {source}")]
    Manifest {
        document: ManifestDocument,
        #[source]
        source: ManifestError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("upload task failed to complete: {0}")]
    Task(String),
}

impl From<packsmith_core::Error> for PublishError {
    fn from(err: packsmith_core::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl PublishError {
    pub(crate) fn manifest(document: ManifestDocument, source: impl Into<ManifestError>) -> Self {
        Self::Manifest {
            document,
            source: source.into(),
        }
    }
}
