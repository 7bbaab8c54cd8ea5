//! Per-file compression policy.
//!
//! Files are classified by name suffix, case-insensitively. Already-compressed
//! formats are never deflated, even if another rule would match.

/// Suffixes that are always stored verbatim.
pub const STORED_SUFFIXES: &[&str] = &[".png", ".zip", ".jar"];

/// Text suffixes that are deflated before upload.
pub const DEFLATE_SUFFIXES: &[&str] = &[
    ".json",
    ".txt",
    ".xml",
    ".toml",
    ".js",
    ".cfg",
    ".properties",
];

/// Classification of a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileClass {
    /// Plain text on the allowlist: deflated.
    Text,
    /// Already-compressed container: stored verbatim.
    Archive,
    /// Anything else: stored verbatim.
    Other,
}

impl FileClass {
    /// Classify a file by its name (or slash-separated relative path).
    pub fn of(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if STORED_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return Self::Archive;
        }
        if DEFLATE_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return Self::Text;
        }
        Self::Other
    }

    /// Whether uploads of this class are deflated.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Text)
    }
}
