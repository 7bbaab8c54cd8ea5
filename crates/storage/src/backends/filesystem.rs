//! Local filesystem storage backend.
//!
//! Objects live at `root/<key>`. Their attributes (content encoding and type)
//! live in a sidecar tree at `root/.attrs/<key>.json` so that reads can undo
//! the encoding the same way an HTTP object store would.

use crate::encoding::{ContentEncoding, decoded_stream};
use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectHead, ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::instrument;
use uuid::Uuid;

/// Directory under the root holding object attributes.
const ATTRS_DIR: &str = ".attrs";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAttributes {
    content_encoding: Option<ContentEncoding>,
    content_type: Option<String>,
}

/// Local filesystem object store.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Runs the checks on the blocking pool since they canonicalize and stat.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Synchronous key path validation.
    ///
    /// Returns an error if the key would escape the storage root, directly or
    /// through a symlink, or if it names the attribute tree.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        for (i, component) in Path::new(key).components().enumerate() {
            match component {
                std::path::Component::Normal(name) if i == 0 && name == ATTRS_DIR => {
                    return Err(StorageError::InvalidKey(format!(
                        "key uses reserved prefix {ATTRS_DIR}: {key}"
                    )));
                }
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }

        let path = root.join(key);
        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        // Check the path itself if present, otherwise its nearest existing ancestor.
        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            match std::fs::symlink_metadata(candidate) {
                Ok(meta) => {
                    let canonical = candidate.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize path: {e}"),
                            ))
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat path: {err}"),
                    )));
                }
            }
            probe = candidate.parent();
        }

        Ok(path)
    }

    fn attrs_path(&self, key: &str) -> PathBuf {
        self.root.join(ATTRS_DIR).join(format!("{key}.json"))
    }

    async fn read_attrs(&self, key: &str) -> StorageResult<StoredAttributes> {
        match fs::read(self.attrs_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("corrupt attributes for {key}: {e}"),
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredAttributes::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Write `reader` to `path` through a uniquely named temp file, fsync, then rename.
    async fn write_atomic<R>(&self, path: &Path, reader: &mut R) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            let written = tokio::io::copy(reader, &mut file).await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(written)
        }
        .await;

        match written {
            Ok(written) => {
                fs::rename(&temp_path, path).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(StorageError::Io(e))
            }
        }
    }

    async fn store<R>(&self, key: &str, reader: &mut R, options: PutOptions) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = self.key_path(key).await?;
        let attrs = StoredAttributes {
            content_encoding: options.content_encoding,
            content_type: options.content_type,
        };
        let attrs_json = serde_json::to_vec(&attrs)
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?;
        // Attributes go first so a visible object always has matching attributes.
        self.write_atomic(&self.attrs_path(key), &mut attrs_json.as_slice())
            .await?;
        self.write_atomic(&path, reader).await
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>> {
        let path = self.key_path(key).await?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        }
        let attrs = self.read_attrs(key).await?;
        Ok(Some(ObjectHead {
            content_encoding: attrs.content_encoding,
            content_type: attrs.content_type,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<Option<ByteStream>> {
        let path = self.key_path(key).await?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let attrs = self.read_attrs(key).await?;
        Ok(Some(decoded_stream(file, attrs.content_encoding)))
    }

    #[instrument(skip(self, data, options), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()> {
        self.store(key, &mut &data[..], options).await?;
        Ok(())
    }

    #[instrument(skip(self, options), fields(backend = "filesystem"))]
    async fn put_file(&self, key: &str, path: &Path, options: PutOptions) -> StorageResult<()> {
        let mut source = fs::File::open(path).await?;
        let written = self.store(key, &mut source, options).await?;
        tracing::debug!(key, bytes = written, "stored file");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        if metadata.permissions().readonly() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("storage root is read-only: {:?}", self.root),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let key = "test/object";
        let data = Bytes::from("hello world");

        backend
            .put(key, data.clone(), PutOptions::default())
            .await
            .unwrap();
        assert!(backend.exists(key).await.unwrap());

        let retrieved = backend.get(key).await.unwrap().unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_missing_object_is_absent_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        assert!(!backend.exists("a/bc/defg/missing").await.unwrap());
        assert!(backend.get("a/bc/defg/missing").await.unwrap().is_none());
        assert!(backend.get_stream("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deflated_object_is_inflated_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let original = b"line one\nline two\n".repeat(50);
        let deflated = crate::encoding::deflate_bytes(&original).await.unwrap();
        backend
            .put("doc.json", deflated.clone(), PutOptions::json_manifest())
            .await
            .unwrap();

        // Raw bytes on disk stay deflated.
        let raw = std::fs::read(dir.path().join("doc.json")).unwrap();
        assert_eq!(raw, deflated.to_vec());

        let read = backend.get("doc.json").await.unwrap().unwrap();
        assert_eq!(read.to_vec(), original);
    }

    #[tokio::test]
    async fn test_overwrite_clears_previous_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let deflated = crate::encoding::deflate_bytes(b"first").await.unwrap();
        backend
            .put("k", deflated, PutOptions::blob(true))
            .await
            .unwrap();
        backend
            .put("k", Bytes::from_static(b"second"), PutOptions::blob(false))
            .await
            .unwrap();

        let read = backend.get("k").await.unwrap().unwrap();
        assert_eq!(read, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn test_put_file_streams_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(source.path(), b"payload").unwrap();
        let backend = FilesystemBackend::new(dir.path().join("store")).await.unwrap();

        backend
            .put_file("x/yz/abcd/rest", source.path(), PutOptions::default())
            .await
            .unwrap();
        let read = backend.get("x/yz/abcd/rest").await.unwrap().unwrap();
        assert_eq!(read, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        assert!(backend.exists("../escape").await.is_err());
        assert!(backend.exists("/absolute/path").await.is_err());
        assert!(backend.exists("foo/../bar").await.is_err());
        assert!(backend.exists(".attrs/foo.json").await.is_err());

        assert!(backend.exists("valid/nested/key").await.is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_traversal_rejected() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside_dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        symlink(outside_dir.path(), dir.path().join("escape")).unwrap();

        let result = backend
            .put(
                "escape/nested/file.txt",
                Bytes::from("data"),
                PutOptions::default(),
            )
            .await;
        match result {
            Err(StorageError::InvalidKey(msg)) => assert!(msg.contains("escapes storage root")),
            other => panic!("expected InvalidKey error, got: {other:?}"),
        }
        assert!(!outside_dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_health_check_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        let modified = std::fs::metadata(dir.path()).unwrap().modified().unwrap();

        backend.health_check().await.unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(
            std::fs::metadata(dir.path()).unwrap().modified().unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn test_health_check_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path().join("store")).await.unwrap();
        std::fs::remove_dir(dir.path().join("store")).unwrap();
        assert!(backend.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_head_reports_stored_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        assert_eq!(backend.head("a/bc/defg/missing").await.unwrap(), None);

        let deflated = crate::deflate_bytes(b"payload").await.unwrap();
        backend
            .put("a/bc/defg/one", deflated, PutOptions::blob(true))
            .await
            .unwrap();
        backend
            .put("a/bc/defg/two", Bytes::from_static(b"payload"), PutOptions::blob(false))
            .await
            .unwrap();

        assert!(backend.head("a/bc/defg/one").await.unwrap().unwrap().is_deflated());
        let plain = backend.head("a/bc/defg/two").await.unwrap().unwrap();
        assert!(!plain.is_deflated());
        assert_eq!(plain.content_type, None);
        assert_eq!(backend.head("a/bc").await.unwrap(), None);
    }
}
