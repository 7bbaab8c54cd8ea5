//! Fingerprinting files on disk.

use packsmith_core::FingerprintHasher;
use packsmith_core::hash::Fingerprint;
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Stream a file through the fingerprint hasher.
pub async fn fingerprint_file(path: &Path, normalize: bool) -> std::io::Result<Fingerprint> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = FingerprintHasher::new(normalize);
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
