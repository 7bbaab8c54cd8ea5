//! Object-store key layout and public URL derivation.

use crate::hash::Fingerprint;

/// Root prefix for every manifest document.
pub const MANIFEST_ROOT: &str = "stable";

/// Derive the sharded storage key for a blob.
///
/// A fingerprint `f` maps to `f[0]/f[1..3]/f[3..7]/f[7..]`. Every hex
/// character of the fingerprint appears in the key, so distinct fingerprints
/// never collide.
pub fn blob_key(fingerprint: &Fingerprint) -> String {
    let hex = fingerprint.to_hex();
    format!("{}/{}/{}/{}", &hex[..1], &hex[1..3], &hex[3..7], &hex[7..])
}

/// Check that a value is usable as a single key segment.
pub fn validate_segment(field: &'static str, value: &str) -> crate::Result<()> {
    let invalid = |reason: &str| crate::Error::InvalidSegment {
        field,
        reason: reason.to_string(),
    };
    if value.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    if value == "." {
        return Err(invalid("must not be a relative path component"));
    }
    if value.contains("..") {
        return Err(invalid("must not contain `..`"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}

/// Manifest keys for one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestLayout {
    project: String,
}

impl ManifestLayout {
    /// Create the layout for a project id.
    pub fn new(project: impl Into<String>) -> crate::Result<Self> {
        let project = project.into();
        validate_segment("project_id", &project)?;
        Ok(Self { project })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn version_dir(&self, version: &str) -> String {
        format!("{MANIFEST_ROOT}/{}/versions/{version}", self.project)
    }

    /// `stable/{project}/versions/{version}/modpack.json`
    pub fn modpack_key(&self, version: &str) -> String {
        format!("{}/modpack.json", self.version_dir(version))
    }

    /// `stable/{project}/versions/{version}/changelog.json`
    pub fn changelog_key(&self, version: &str) -> String {
        format!("{}/changelog.json", self.version_dir(version))
    }

    /// `stable/{project}/versions.json`
    pub fn versions_key(&self) -> String {
        format!("{MANIFEST_ROOT}/{}/versions.json", self.project)
    }

    /// `stable/{project}/meta.json`
    pub fn meta_key(&self) -> String {
        format!("{MANIFEST_ROOT}/{}/meta.json", self.project)
    }
}

/// Public base URL that clients download stored objects from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadBase(String);

impl DownloadBase {
    /// Parse a base URL. Only http and https are accepted; trailing slashes are dropped.
    pub fn parse(url: &str) -> crate::Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let lower = trimmed.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() => Ok(Self(trimmed.to_string())),
            _ => Err(crate::Error::Config(format!(
                "download_url must be an absolute http(s) URL, got {url:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public URL for an object key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.0, key.trim_start_matches('/'))
    }
}
