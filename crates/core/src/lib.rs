//! Core domain types for the packsmith modpack publisher.
//!
//! This crate defines the data model shared by the other crates:
//! - Content fingerprints and their normalization
//! - The object-store key layout for blobs and manifests
//! - The per-file compression policy
//! - Manifest documents and their JSON shape
//! - Publish configuration

pub mod compression;
pub mod config;
pub mod error;
pub mod hash;
pub mod layout;
pub mod manifest;
pub mod source;

pub use compression::FileClass;
pub use config::{HashNormalization, PublishConfig, StorageConfig, UploadConfig};
pub use error::{Error, Result};
pub use hash::{Fingerprint, FingerprintHasher};
pub use layout::{DownloadBase, ManifestLayout, blob_key};
pub use manifest::{Distribution, FileEntry, MetaPointer, Modpack, VersionIndex, VersionRecord};
pub use source::SourceFile;

/// Default number of concurrent per-file upload tasks.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Default number of retries after a transient failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
