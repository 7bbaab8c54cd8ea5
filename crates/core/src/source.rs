//! Source files discovered on disk.

use crate::manifest::Distribution;
use std::path::{Path, PathBuf};

/// A file selected for publishing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    absolute_path: PathBuf,
    relative_path: String,
    size: u64,
    dist: Option<Distribution>,
}

impl SourceFile {
    pub fn new(
        absolute_path: PathBuf,
        relative_path: String,
        size: u64,
        dist: Option<Distribution>,
    ) -> Self {
        Self {
            absolute_path,
            relative_path,
            size,
            dist,
        }
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// Path relative to its source root, always `/`-separated.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn dist(&self) -> Option<Distribution> {
        self.dist
    }
}

/// Join the components of a relative path with `/`.
pub fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
