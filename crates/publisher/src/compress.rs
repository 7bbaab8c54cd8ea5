//! Deflating source files before upload.

use async_compression::Level;
use async_compression::tokio::write::ZlibEncoder;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// Deflate `source` at maximum compression into a new temporary file.
///
/// The returned handle deletes the file when dropped, so the compressed copy
/// never outlives the upload that uses it.
pub async fn deflate_to_temp(source: &Path) -> std::io::Result<NamedTempFile> {
    deflate_to_temp_in(source, &std::env::temp_dir()).await
}

/// Like [`deflate_to_temp`], creating the temporary file in `dir`.
pub async fn deflate_to_temp_in(source: &Path, dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut input = tokio::fs::File::open(source).await?;
    let temp = tempfile::Builder::new()
        .prefix("packsmith-")
        .suffix(".deflate")
        .tempfile_in(dir)?;

    let output = tokio::fs::File::from_std(temp.reopen()?);
    let mut encoder = ZlibEncoder::with_quality(output, Level::Best);
    tokio::io::copy(&mut input, &mut encoder).await?;
    encoder.shutdown().await?;
    encoder.into_inner().sync_all().await?;

    Ok(temp)
}
