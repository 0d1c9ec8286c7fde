//! Hierarchical on-disk content store.
//!
//! Every artifact family lives under a per-kind root, partitioned first
//! by domain and then (for release-scoped artifacts) by release id:
//!
//! ```text
//! <data_root>/
//!   captures/<domain>/<source_id>.{html,json}
//!   canonical/<domain>/<release_id>/<clo_id>.json
//!   chunks/<domain>/<release_id>/<chunk_id>.json
//!   embeddings/<domain>/<release_id>/<chunk_id>_<emb_id>.json
//!   vector_index/<domain>/<release_id>/index.jsonl
//!   releases/<domain>/{active_release.txt, audit.jsonl, releases/<release_id>/release.json}
//!   observability/<domain>/{events.jsonl, counters.json}
//! ```
//!
//! JSON writes go through a temp-file-plus-rename so readers never
//! observe a torn artifact.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::StorePaths;
use crate::{Error, Result};

/// Maximum allowed slug length for domains, source ids, and release ids.
const MAX_SLUG_LEN: usize = 128;

/// Validate that a slug is safe to use as a path component.
///
/// Domains, source ids, and release ids all share this rule: non-empty,
/// ASCII alphanumeric plus `-`/`_`/`.`, no leading `.` or `-`, bounded
/// length. Anything else would risk traversal or surprising paths.
pub fn validate_slug(kind: &str, slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(Error::Validation(format!("{kind} is required")));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(Error::Validation(format!(
            "Invalid {kind} '{slug}': exceeds maximum length of {MAX_SLUG_LEN} characters"
        )));
    }
    if slug.starts_with('.') || slug.starts_with('-') {
        return Err(Error::Validation(format!(
            "Invalid {kind} '{slug}': cannot start with '.' or '-'"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::Validation(format!(
            "Invalid {kind} '{slug}': only [A-Za-z0-9._-] are allowed"
        )));
    }
    if slug.contains("..") {
        return Err(Error::Validation(format!(
            "Invalid {kind} '{slug}': contains path traversal characters"
        )));
    }
    Ok(())
}

/// Filesystem layout and persistence primitives for pipeline artifacts.
#[derive(Debug, Clone)]
pub struct ContentStore {
    paths: StorePaths,
}

impl ContentStore {
    /// Create a store over the given root layout.
    #[must_use]
    pub const fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// The configured root layout.
    #[must_use]
    pub const fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Directory holding captures for a domain.
    pub fn captures_dir(&self, domain: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        Ok(self.paths.captures_root.join(domain))
    }

    /// Raw payload path for a capture.
    pub fn capture_payload_path(&self, domain: &str, source_id: &str) -> Result<PathBuf> {
        validate_slug("source_id", source_id)?;
        Ok(self.captures_dir(domain)?.join(format!("{source_id}.html")))
    }

    /// Metadata path for a capture.
    pub fn capture_meta_path(&self, domain: &str, source_id: &str) -> Result<PathBuf> {
        validate_slug("source_id", source_id)?;
        Ok(self.captures_dir(domain)?.join(format!("{source_id}.json")))
    }

    /// Directory for canonical objects of one release.
    pub fn canonical_dir(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        Ok(self.paths.canonical_root.join(domain).join(release_id))
    }

    /// Path of one canonical object file.
    pub fn canonical_path(
        &self,
        domain: &str,
        release_id: &str,
        clo_id: &str,
    ) -> Result<PathBuf> {
        Ok(self
            .canonical_dir(domain, release_id)?
            .join(format!("{clo_id}.json")))
    }

    /// Directory for chunk records of one release.
    pub fn chunks_dir(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        Ok(self.paths.chunks_root.join(domain).join(release_id))
    }

    /// Path of one chunk record file.
    pub fn chunk_path(&self, domain: &str, release_id: &str, chunk_id: &str) -> Result<PathBuf> {
        Ok(self
            .chunks_dir(domain, release_id)?
            .join(format!("{chunk_id}.json")))
    }

    /// Directory for embedding records of one release.
    pub fn embeddings_dir(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        Ok(self.paths.embeddings_root.join(domain).join(release_id))
    }

    /// Directory for the vector index of one release.
    pub fn index_dir(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        Ok(self.paths.vector_index_root.join(domain).join(release_id))
    }

    /// Path of the vector index file for one release.
    pub fn index_path(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        Ok(self.index_dir(domain, release_id)?.join("index.jsonl"))
    }

    /// Serialize `value` as pretty JSON to `path`, atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        write_atomic(path, &json)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Read and deserialize a JSON artifact.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            Error::Storage(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(value)
    }
}

/// Write `content` to `path` via a temp file and rename.
///
/// Parent directories are created as needed. Readers of `path` see
/// either the old bytes or the new bytes, never a prefix.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Storage(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| Error::Storage(format!("Failed to commit {}: {e}", path.display())))?;
    Ok(())
}

/// Append one line to a JSONL file, creating parents as needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Storage(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Storage(format!("Failed to open {}: {e}", path.display())))?;
    writeln!(file, "{line}")
        .map_err(|e| Error::Storage(format!("Failed to append {}: {e}", path.display())))?;
    Ok(())
}

/// Read the last `limit` lines of a JSONL file newest-first, parsing
/// each as `T` and skipping blank or malformed lines.
pub fn read_jsonl_tail<T: DeserializeOwned>(path: &Path, limit: usize) -> Result<Vec<T>> {
    if limit == 0 || !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
    let lines: Vec<&str> = raw.lines().collect();
    let start = lines.len().saturating_sub(limit);
    let mut out = Vec::new();
    for line in lines[start..].iter().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str(line) {
            out.push(value);
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorePaths;
    use serde::Deserialize;
    use tempfile::TempDir;

    fn test_store() -> (ContentStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(StorePaths::from_data_root(temp.path().to_path_buf()));
        (store, temp)
    }

    #[test]
    fn slug_validation_rejects_traversal() {
        assert!(validate_slug("domain", "../etc").is_err());
        assert!(validate_slug("domain", "a/b").is_err());
        assert!(validate_slug("domain", "a\\b").is_err());
        assert!(validate_slug("domain", ".hidden").is_err());
        assert!(validate_slug("domain", "").is_err());
        assert!(validate_slug("domain", "-flag").is_err());
        assert!(validate_slug("domain", "a..b").is_err());
    }

    #[test]
    fn slug_validation_accepts_release_ids() {
        assert!(validate_slug("domain", "terraform").is_ok());
        assert!(validate_slug("release_id", "tf_20260801-101500_a1b2c3d4").is_ok());
        assert!(validate_slug("source_id", "src_terraform_001").is_ok());
    }

    #[test]
    fn layout_matches_contract() {
        let (store, temp) = test_store();
        let root = temp.path();

        assert_eq!(
            store.capture_payload_path("tf", "s1").unwrap(),
            root.join("captures/tf/s1.html")
        );
        assert_eq!(
            store.canonical_path("tf", "r1", "clo_abc").unwrap(),
            root.join("canonical/tf/r1/clo_abc.json")
        );
        assert_eq!(
            store.chunk_path("tf", "r1", "chk_abc").unwrap(),
            root.join("chunks/tf/r1/chk_abc.json")
        );
        assert_eq!(
            store.index_path("tf", "r1").unwrap(),
            root.join("vector_index/tf/r1/index.jsonl")
        );
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn json_roundtrip_is_atomic_and_lossless() {
        let (store, temp) = test_store();
        let path = temp.path().join("nested/dir/doc.json");
        let doc = Doc {
            name: "alpha".into(),
            count: 3,
        };

        store.write_json(&path, &doc).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded: Doc = store.read_json(&path).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn jsonl_tail_is_newest_first_and_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        append_line(&path, r#"{"name":"a","count":1}"#).unwrap();
        append_line(&path, "not json").unwrap();
        append_line(&path, r#"{"name":"b","count":2}"#).unwrap();

        let tail: Vec<Doc> = read_jsonl_tail(&path, 10).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].name, "b");
        assert_eq!(tail[1].name, "a");

        let limited: Vec<Doc> = read_jsonl_tail(&path, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].name, "b");

        let empty: Vec<Doc> = read_jsonl_tail(&path, 0).unwrap();
        assert!(empty.is_empty());
    }
}
