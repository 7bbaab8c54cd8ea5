//! Source directory enumeration.

use crate::error::PublishError;
use futures::{Stream, StreamExt};
use packsmith_core::source::slash_path;
use packsmith_core::{Distribution, SourceFile};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// A directory whose files are published, with the distribution tag they carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRoot {
    pub path: PathBuf,
    pub dist: Option<Distribution>,
}

impl SourceRoot {
    pub fn new(path: impl Into<PathBuf>, dist: Option<Distribution>) -> Self {
        Self {
            path: path.into(),
            dist,
        }
    }
}

/// Iterative walk over one source root.
///
/// Every call to [`SourceWalker::walk`] starts a fresh traversal. Errors are
/// yielded as stream items; the walk stops at the first one.
#[derive(Clone, Debug)]
pub struct SourceWalker {
    root: SourceRoot,
}

impl SourceWalker {
    pub fn new(root: SourceRoot) -> Self {
        Self { root }
    }

    pub fn walk(&self) -> impl Stream<Item = Result<SourceFile, PublishError>> + Send + 'static {
        let root = self.root.clone();

        async_stream::try_stream! {
            let scan_err = |path: &PathBuf| {
                let path = path.clone();
                move |source| PublishError::Scan { path, source }
            };

            let mut stack = vec![root.path.clone()];
            while let Some(dir) = stack.pop() {
                let mut entries = fs::read_dir(&dir).await.map_err(scan_err(&dir))?;
                while let Some(entry) = entries.next_entry().await.map_err(scan_err(&dir))? {
                    let path = entry.path();
                    let file_type = entry.file_type().await.map_err(scan_err(&path))?;

                    let metadata = if file_type.is_dir() {
                        stack.push(path);
                        continue;
                    } else if file_type.is_symlink() {
                        match fs::metadata(&path).await {
                            Ok(meta) if meta.is_file() => meta,
                            Ok(_) => {
                                warn!(path = %path.display(), "skipping symlink that is not a regular file");
                                continue;
                            }
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "skipping broken symlink");
                                continue;
                            }
                        }
                    } else if file_type.is_file() {
                        entry.metadata().await.map_err(scan_err(&path))?
                    } else {
                        debug!(path = %path.display(), "skipping special file");
                        continue;
                    };

                    let relative = path
                        .strip_prefix(&root.path)
                        .map(slash_path)
                        .map_err(|e| PublishError::Scan {
                            path: path.clone(),
                            source: std::io::Error::other(e),
                        })?;

                    yield SourceFile::new(path, relative, metadata.len(), root.dist);
                }
            }
        }
    }
}

/// Walk every root and collect the files, rejecting relative paths that
/// appear in more than one root.
pub async fn collect_sources(roots: &[SourceRoot]) -> Result<Vec<SourceFile>, PublishError> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for root in roots {
        let mut stream = Box::pin(SourceWalker::new(root.clone()).walk());
        let mut count = 0usize;
        while let Some(file) = stream.next().await {
            let file = file?;
            if !seen.insert(file.relative_path().to_string()) {
                return Err(PublishError::DuplicatePath(file.relative_path().to_string()));
            }
            files.push(file);
            count += 1;
        }
        debug!(root = %root.path.display(), dist = ?root.dist, files = count, "scanned source root");
    }

    Ok(files)
}
