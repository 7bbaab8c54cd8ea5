//! Storage trait definitions.

use crate::encoding::ContentEncoding;
use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Content type used for manifest documents.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Object attributes sent with a write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Encoding the bytes are already in. Readers undo it transparently.
    pub content_encoding: Option<ContentEncoding>,
    pub content_type: Option<String>,
}

impl PutOptions {
    /// Attributes for a content-addressed blob.
    pub fn blob(compressed: bool) -> Self {
        Self {
            content_encoding: compressed.then_some(ContentEncoding::Deflate),
            content_type: None,
        }
    }

    /// Attributes for a deflated JSON manifest.
    pub fn json_manifest() -> Self {
        Self {
            content_encoding: Some(ContentEncoding::Deflate),
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
        }
    }
}

/// Attributes of a stored object, as returned by [`ObjectStore::head`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_encoding: Option<ContentEncoding>,
    pub content_type: Option<String>,
}

impl ObjectHead {
    /// Whether the stored bytes are deflated.
    pub fn is_deflated(&self) -> bool {
        self.content_encoding == Some(ContentEncoding::Deflate)
    }
}

/// Object store abstraction for content-addressed storage.
///
/// Absence is not an error: `exists` returns false and the getters return
/// `None` for missing keys. Writes overwrite or create.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetch an object's stored attributes without reading its body.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectHead>>;

    /// Get an object as a byte stream, decoded according to its stored
    /// content encoding.
    async fn get_stream(&self, key: &str) -> StorageResult<Option<ByteStream>>;

    /// Get an object's decoded content.
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let Some(mut stream) = self.get_stream(key).await? else {
            return Ok(None);
        };
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Some(buf.freeze()))
    }

    /// Put an in-memory object.
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()>;

    /// Put an object by streaming a local file.
    async fn put_file(&self, key: &str, path: &Path, options: PutOptions) -> StorageResult<()>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity without writing anything.
    ///
    /// Called once when a publisher starts, before any other request. The
    /// default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Release backend resources. Called once when a publisher shuts down.
    async fn shutdown(&self) -> StorageResult<()> {
        Ok(())
    }
}
