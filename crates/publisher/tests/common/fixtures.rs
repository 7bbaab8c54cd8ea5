use bytes::Bytes;
use packsmith_core::{HashNormalization, PublishConfig, StorageConfig, UploadConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

/// A source tree and a filesystem store, both in temp dirs.
#[allow(dead_code)]
pub struct PublishFixture {
    pub source: TempDir,
    pub store: TempDir,
}

#[allow(dead_code)]
impl PublishFixture {
    pub fn new() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            store: TempDir::new().unwrap(),
        }
    }

    /// Write a file under the source tree, creating parent directories.
    pub fn write(&self, rel: &str, data: &[u8]) -> PathBuf {
        write_file(self.source.path(), rel, data)
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Read the raw stored bytes of an object, bypassing content decoding.
    pub fn raw_object(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.store.path().join(key)).ok()
    }

    /// Every path under the store with its modification time and contents.
    /// Directories map to empty contents.
    pub fn store_snapshot(&self) -> BTreeMap<PathBuf, (SystemTime, Vec<u8>)> {
        let mut snapshot = BTreeMap::new();
        let mut pending = vec![self.store.path().to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                let meta = std::fs::metadata(&path).unwrap();
                let contents = if meta.is_dir() {
                    pending.push(path.clone());
                    Vec::new()
                } else {
                    std::fs::read(&path).unwrap()
                };
                snapshot.insert(path, (meta.modified().unwrap(), contents));
            }
        }
        snapshot
    }

    /// Config publishing `version` from this fixture's source tree.
    pub fn config(&self, version: &str) -> PublishConfig {
        PublishConfig {
            storage: StorageConfig::Filesystem {
                path: self.store.path().to_path_buf(),
            },
            download_url: "https://cdn.example.com/packs".to_string(),
            project_id: "test-pack".to_string(),
            source_dir: self.source.path().to_path_buf(),
            server_dir: None,
            client_dir: None,
            version_name: version.to_string(),
            libraries: BTreeMap::from([("net.minecraft".to_string(), "1.20.1".to_string())]),
            upload: UploadConfig {
                concurrency: 4,
                max_retries: 3,
                retry_backoff_ms: 1,
                hash_normalization: HashNormalization::All,
            },
        }
    }
}

#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, data: &[u8]) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, data).unwrap();
    path
}

/// Generate deterministic test data using a seeded pseudo-random generator.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}
