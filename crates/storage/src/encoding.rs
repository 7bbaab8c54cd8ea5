//! Content encodings understood by the backends.

use crate::error::StorageError;
use crate::traits::ByteStream;
use async_compression::Level;
use async_compression::tokio::bufread::ZlibDecoder;
use async_compression::tokio::write::ZlibEncoder;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio_util::io::ReaderStream;

/// An encoding applied to stored bytes.
///
/// `deflate` follows HTTP semantics: a zlib-wrapped DEFLATE stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Deflate,
}

impl ContentEncoding {
    /// Header value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deflate => "deflate",
        }
    }

    /// Parse a `Content-Encoding` header value. Unknown encodings yield `None`
    /// and the bytes are returned as stored.
    pub fn from_header(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deflate a buffer at maximum compression.
pub async fn deflate_bytes(data: &[u8]) -> std::io::Result<Bytes> {
    let mut encoder = ZlibEncoder::with_quality(Vec::new(), Level::Best);
    encoder.write_all(data).await?;
    encoder.shutdown().await?;
    Ok(Bytes::from(encoder.into_inner()))
}

/// Wrap a raw object reader so the stream yields decoded bytes.
pub fn decoded_stream<R>(reader: R, encoding: Option<ContentEncoding>) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    match encoding {
        Some(ContentEncoding::Deflate) => {
            let decoder = ZlibDecoder::new(BufReader::new(reader));
            Box::pin(ReaderStream::new(decoder).map(|r| r.map_err(StorageError::Io)))
        }
        None => Box::pin(ReaderStream::new(reader).map(|r| r.map_err(StorageError::Io))),
    }
}
