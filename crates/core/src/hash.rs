//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 of a file's bytes, optionally with ASCII
//! whitespace (tab, newline, carriage return, space) removed first. Two files
//! with the same normalized bytes share one fingerprint and therefore one
//! stored blob, regardless of their names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Bytes dropped from the hash input when normalization is on.
pub const NORMALIZED_BYTES: [u8; 4] = [b'\t', b'\n', b'\r', b' '];

/// A SHA-256 content fingerprint, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create a fingerprint from raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Fingerprint an in-memory buffer.
    pub fn compute(data: &[u8], normalize: bool) -> Self {
        let mut hasher = FingerprintHasher::new(normalize);
        hasher.update(data);
        hasher.finalize()
    }

    /// Parse from a 64-character hex string (either case).
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 {
            return Err(crate::Error::InvalidFingerprint(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|e| crate::Error::InvalidFingerprint(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidFingerprint(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental fingerprint hasher.
///
/// Feed it chunks of a file in order; chunk boundaries do not affect the
/// result.
pub struct FingerprintHasher {
    digest: Sha256,
    normalize: bool,
    scratch: Vec<u8>,
}

impl FingerprintHasher {
    /// Create a hasher. With `normalize` set, whitespace bytes are skipped.
    pub fn new(normalize: bool) -> Self {
        Self {
            digest: Sha256::new(),
            normalize,
            scratch: Vec::new(),
        }
    }

    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        if !self.normalize {
            self.digest.update(data);
            return;
        }
        self.scratch.clear();
        self.scratch.extend(
            data.iter()
                .copied()
                .filter(|b| !NORMALIZED_BYTES.contains(b)),
        );
        self.digest.update(&self.scratch);
    }

    /// Finalize and return the fingerprint.
    pub fn finalize(self) -> Fingerprint {
        Fingerprint(self.digest.finalize().into())
    }
}
