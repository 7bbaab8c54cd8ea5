//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid key segment {field}: {reason}")]
    InvalidSegment { field: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("version {0} is already in the index")]
    DuplicateVersion(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
