//! Offline gating checks: schema + scope + cross-reference validation.
//!
//! The gates cross-validate whatever artifacts exist on disk: release
//! records against their paths, canonical objects and chunks against
//! their scopes, and every vector index row against its chunk file and
//! embedding file. A clean tree yields no issues; an empty tree passes
//! trivially, which keeps the checks useful in fresh CI checkouts.
//!
//! Gates never raise for bad artifacts; they collect issues and let the
//! caller decide (the CLI exits 2 when any are reported).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::StorePaths;
use crate::types::{CanonicalObject, Chunk, ReleaseRecord};
use crate::vector::IndexRow;

static CLO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^clo_[0-9a-f]{24}$").expect("valid regex"));
static CHUNK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chk_[0-9a-f]{24}$").expect("valid regex"));

/// One validation finding.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GateIssue {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Offending file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl GateIssue {
    fn new(code: &str, message: impl Into<String>, path: Option<&Path>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            path: path.map(Path::to_path_buf),
        }
    }
}

/// Recursively collect files matching `name_matches`, in sorted order
/// for deterministic reports.
fn walk_files(root: &Path, name_matches: &dyn Fn(&str) -> bool, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            walk_files(&path, name_matches, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(name_matches)
        {
            out.push(path);
        }
    }
}

/// `(domain, release_id)` from the first two path components under a
/// store root.
fn scope_from_path(root: &Path, file: &Path) -> (Option<String>, Option<String>) {
    let Ok(rel) = file.strip_prefix(root) else {
        return (None, None);
    };
    let mut components = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(ToString::to_string));
    (components.next(), components.next())
}

/// Validate release records and active-release pointers.
#[must_use]
pub fn check_release_records(releases_root: &Path) -> Vec<GateIssue> {
    let mut issues = Vec::new();

    let mut records = Vec::new();
    walk_files(releases_root, &|name| name == "release.json", &mut records);
    for path in &records {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(GateIssue::new(
                    "release_json_invalid",
                    format!("Could not read release.json: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        let record = match serde_json::from_str::<ReleaseRecord>(&raw) {
            Ok(record) => record,
            Err(err) => {
                issues.push(GateIssue::new(
                    "release_schema_invalid",
                    format!("Schema validation failed: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        if record.release_id.is_empty() || record.domain.is_empty() {
            issues.push(GateIssue::new(
                "release_schema_invalid",
                "Release record is missing domain or release_id",
                Some(path),
            ));
            continue;
        }
        // Layout: <root>/<domain>/releases/<release_id>/release.json
        if let Ok(rel) = path.strip_prefix(releases_root) {
            let parts: Vec<String> = rel
                .components()
                .filter_map(|c| c.as_os_str().to_str().map(ToString::to_string))
                .collect();
            if parts.len() >= 4 && parts[1] == "releases" {
                if record.domain != parts[0] {
                    issues.push(GateIssue::new(
                        "release_domain_mismatch",
                        "Release record domain does not match path",
                        Some(path),
                    ));
                }
                if record.release_id != parts[2] {
                    issues.push(GateIssue::new(
                        "release_id_mismatch",
                        "Release record release_id does not match path",
                        Some(path),
                    ));
                }
            }
        }
    }

    if let Ok(entries) = fs::read_dir(releases_root) {
        let mut domains: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        domains.sort();
        for domain_dir in domains.into_iter().filter(|p| p.is_dir()) {
            let active_path = domain_dir.join("active_release.txt");
            if !active_path.exists() {
                continue;
            }
            let active = fs::read_to_string(&active_path)
                .map(|raw| raw.trim().to_string())
                .unwrap_or_default();
            if active.is_empty() {
                issues.push(GateIssue::new(
                    "active_release_empty",
                    "active_release.txt is empty",
                    Some(&active_path),
                ));
                continue;
            }
            let expected = domain_dir.join("releases").join(&active).join("release.json");
            if !expected.exists() {
                issues.push(GateIssue::new(
                    "active_release_missing",
                    "active_release.txt points to a missing release.json",
                    Some(&active_path),
                ));
            }
        }
    }

    issues
}

/// Validate canonical objects against schema and path scope.
#[must_use]
pub fn check_canonical_store(canonical_root: &Path) -> Vec<GateIssue> {
    let mut issues = Vec::new();
    let mut files = Vec::new();
    walk_files(
        canonical_root,
        &|name| name.ends_with(".json") && name != "release.json",
        &mut files,
    );

    for path in &files {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(GateIssue::new(
                    "canonical_json_invalid",
                    format!("Could not read JSON: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        let object = match serde_json::from_str::<CanonicalObject>(&raw) {
            Ok(object) => object,
            Err(err) => {
                issues.push(GateIssue::new(
                    "canonical_schema_invalid",
                    format!("Schema validation failed: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        if !CLO_ID_RE.is_match(&object.id) {
            issues.push(GateIssue::new(
                "canonical_schema_invalid",
                format!("Canonical id '{}' does not match clo_<24hex>", object.id),
                Some(path),
            ));
        }
        let (domain, release_id) = scope_from_path(canonical_root, path);
        if domain.is_some_and(|d| d != object.domain) {
            issues.push(GateIssue::new(
                "canonical_domain_mismatch",
                "Canonical domain does not match path",
                Some(path),
            ));
        }
        if release_id.is_some_and(|r| r != object.provenance.release_id) {
            issues.push(GateIssue::new(
                "canonical_release_mismatch",
                "Canonical provenance.release_id does not match path",
                Some(path),
            ));
        }
    }
    issues
}

/// Validate chunk records against schema, scope, and filename.
#[must_use]
pub fn check_chunk_store(chunks_root: &Path) -> Vec<GateIssue> {
    let mut issues = Vec::new();
    let mut files = Vec::new();
    walk_files(chunks_root, &|name| name.ends_with(".json"), &mut files);

    for path in &files {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(GateIssue::new(
                    "chunk_json_invalid",
                    format!("Could not read JSON: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        let chunk = match serde_json::from_str::<Chunk>(&raw) {
            Ok(chunk) => chunk,
            Err(err) => {
                issues.push(GateIssue::new(
                    "chunk_schema_invalid",
                    format!("Schema validation failed: {err}"),
                    Some(path),
                ));
                continue;
            },
        };
        if !CHUNK_ID_RE.is_match(&chunk.chunk_id) {
            issues.push(GateIssue::new(
                "chunk_schema_invalid",
                format!("Chunk id '{}' does not match chk_<24hex>", chunk.chunk_id),
                Some(path),
            ));
        }
        let (domain, release_id) = scope_from_path(chunks_root, path);
        if domain.is_some_and(|d| d != chunk.domain) {
            issues.push(GateIssue::new(
                "chunk_domain_mismatch",
                "Chunk domain does not match path",
                Some(path),
            ));
        }
        if release_id.is_some_and(|r| r != chunk.release_id) {
            issues.push(GateIssue::new(
                "chunk_release_mismatch",
                "Chunk release_id does not match path",
                Some(path),
            ));
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if chunk.chunk_id != stem {
            issues.push(GateIssue::new(
                "chunk_id_mismatch",
                "Chunk chunk_id does not match filename",
                Some(path),
            ));
        }
    }
    issues
}

/// Validate vector index rows and every file they reference.
#[must_use]
pub fn check_vector_index(
    vector_root: &Path,
    chunks_root: &Path,
    embeddings_root: &Path,
) -> Vec<GateIssue> {
    let mut issues = Vec::new();
    let mut indexes = Vec::new();
    walk_files(vector_root, &|name| name == "index.jsonl", &mut indexes);

    let embeddings_root = absolutize(embeddings_root);

    for index_path in &indexes {
        let (path_domain, path_release) = scope_from_path(vector_root, index_path);
        let raw = match fs::read_to_string(index_path) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(GateIssue::new(
                    "index_read_failed",
                    format!("Could not read index.jsonl: {err}"),
                    Some(index_path),
                ));
                continue;
            },
        };

        for (line_no, line) in raw.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row = match serde_json::from_str::<IndexRow>(line) {
                Ok(row) => row,
                Err(err) => {
                    issues.push(GateIssue::new(
                        "index_row_invalid",
                        format!("Line {line_no}: JSON parse failed: {err}"),
                        Some(index_path),
                    ));
                    continue;
                },
            };
            if path_domain.as_deref().is_some_and(|d| d != row.domain) {
                issues.push(GateIssue::new(
                    "index_domain_mismatch",
                    format!("Line {line_no}: domain mismatch"),
                    Some(index_path),
                ));
            }
            if path_release.as_deref().is_some_and(|r| r != row.release_id) {
                issues.push(GateIssue::new(
                    "index_release_mismatch",
                    format!("Line {line_no}: release_id mismatch"),
                    Some(index_path),
                ));
            }
            if row.chunk_id.is_empty() {
                issues.push(GateIssue::new(
                    "index_missing_chunk_id",
                    format!("Line {line_no}: missing chunk_id"),
                    Some(index_path),
                ));
                continue;
            }

            let chunk_path = chunks_root
                .join(&row.domain)
                .join(&row.release_id)
                .join(format!("{}.json", row.chunk_id));
            if chunk_path.exists() {
                let chunk_ok = fs::read_to_string(&chunk_path)
                    .ok()
                    .and_then(|raw| serde_json::from_str::<Chunk>(&raw).ok())
                    .is_some();
                if !chunk_ok {
                    issues.push(GateIssue::new(
                        "index_chunk_invalid",
                        format!("Line {line_no}: chunk file invalid"),
                        Some(&chunk_path),
                    ));
                }
            } else {
                issues.push(GateIssue::new(
                    "index_missing_chunk_file",
                    format!("Line {line_no}: missing chunk file"),
                    Some(&chunk_path),
                ));
            }

            issues.extend(check_embedding_reference(
                &row,
                line_no,
                index_path,
                &embeddings_root,
            ));
        }
    }
    issues
}

fn check_embedding_reference(
    row: &IndexRow,
    line_no: usize,
    index_path: &Path,
    embeddings_root: &Path,
) -> Vec<GateIssue> {
    let mut issues = Vec::new();

    let Some(raw_path) = row.embedding_ref.strip_prefix("file:") else {
        issues.push(GateIssue::new(
            "index_embedding_ref_invalid",
            format!("Line {line_no}: unsupported embedding_ref"),
            Some(index_path),
        ));
        return issues;
    };
    let embedding_path = PathBuf::from(raw_path);
    if !embedding_path.exists() {
        issues.push(GateIssue::new(
            "index_missing_embedding",
            format!("Line {line_no}: embedding file missing"),
            Some(&embedding_path),
        ));
        return issues;
    }

    let payload = fs::read_to_string(&embedding_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok());
    let Some(payload) = payload else {
        issues.push(GateIssue::new(
            "embedding_json_invalid",
            format!("Line {line_no}: embedding JSON invalid"),
            Some(&embedding_path),
        ));
        return issues;
    };

    let field = |name: &str| payload.get(name).and_then(|v| v.as_str()).unwrap_or("");
    if field("chunk_id") != row.chunk_id {
        issues.push(GateIssue::new(
            "embedding_chunk_id_mismatch",
            format!("Line {line_no}: embedding chunk_id mismatch"),
            Some(&embedding_path),
        ));
    }
    if field("domain") != row.domain {
        issues.push(GateIssue::new(
            "embedding_domain_mismatch",
            format!("Line {line_no}: embedding domain mismatch"),
            Some(&embedding_path),
        ));
    }
    if field("release_id") != row.release_id {
        issues.push(GateIssue::new(
            "embedding_release_id_mismatch",
            format!("Line {line_no}: embedding release_id mismatch"),
            Some(&embedding_path),
        ));
    }

    let vector_ok = payload
        .get("vector")
        .and_then(|v| v.as_array())
        .is_some_and(|values| values.iter().all(serde_json::Value::is_number));
    if !vector_ok {
        issues.push(GateIssue::new(
            "embedding_vector_invalid",
            format!("Line {line_no}: embedding vector invalid"),
            Some(&embedding_path),
        ));
    }

    if !absolutize(&embedding_path).starts_with(embeddings_root) {
        issues.push(GateIssue::new(
            "embedding_outside_root",
            format!("Line {line_no}: embedding file not under embeddings root"),
            Some(&embedding_path),
        ));
    }

    issues
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Run every gate family over the configured roots.
#[must_use]
pub fn run_all_gates(paths: &StorePaths) -> Vec<GateIssue> {
    let mut issues = Vec::new();
    issues.extend(check_release_records(&paths.releases_root));
    issues.extend(check_canonical_store(&paths.canonical_root));
    issues.extend(check_chunk_store(&paths.chunks_root));
    issues.extend(check_vector_index(
        &paths.vector_index_root,
        &paths.chunks_root,
        &paths.embeddings_root,
    ));
    issues
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::{IngestionRequest, Pipeline};
    use crate::releases::ReleaseManager;
    use tempfile::TempDir;

    const HTML: &str = "<h1>Install Guide</h1>\
        <p>Run the install command to configure the service.</p>";

    async fn seeded_config() -> (Config, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        let pipeline = Pipeline::from_config(&config).unwrap();
        pipeline
            .run(&IngestionRequest {
                domain: "tf".to_string(),
                source_id: "s1".to_string(),
                release_id: "r1".to_string(),
                raw_html: HTML.to_string(),
                created_by: None,
                write_release: true,
            })
            .await
            .unwrap();
        (config, temp)
    }

    fn codes(issues: &[GateIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[tokio::test]
    async fn clean_tree_passes_all_gates() {
        let (config, _temp) = seeded_config().await;
        let issues = run_all_gates(&config.paths);
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn empty_tree_passes_trivially() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        assert!(run_all_gates(&config.paths).is_empty());
    }

    #[tokio::test]
    async fn deleted_embedding_file_is_reported() {
        let (config, temp) = seeded_config().await;
        let dir = temp.path().join("embeddings/tf/r1");
        for entry in fs::read_dir(&dir).unwrap() {
            fs::remove_file(entry.unwrap().path()).unwrap();
        }
        let issues = run_all_gates(&config.paths);
        assert!(codes(&issues).contains(&"index_missing_embedding"));
    }

    #[tokio::test]
    async fn active_pointer_to_missing_release_is_reported() {
        let (config, _temp) = seeded_config().await;
        let releases = ReleaseManager::new(config.paths.releases_root.clone());
        releases.promote_release("tf", "r1", None, None).unwrap();
        assert!(run_all_gates(&config.paths).is_empty());

        crate::store::write_atomic(
            &config.paths.releases_root.join("tf/active_release.txt"),
            "ghost",
        )
        .unwrap();
        let issues = check_release_records(&config.paths.releases_root);
        assert!(codes(&issues).contains(&"active_release_missing"));
    }

    #[tokio::test]
    async fn scope_mismatches_are_reported() {
        let (config, temp) = seeded_config().await;

        // Relocate a chunk file into another release directory.
        let chunk_dir = temp.path().join("chunks/tf/r1");
        let chunk_path = fs::read_dir(&chunk_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let stray_dir = temp.path().join("chunks/tf/r9");
        fs::create_dir_all(&stray_dir).unwrap();
        fs::copy(&chunk_path, stray_dir.join(chunk_path.file_name().unwrap())).unwrap();

        let issues = check_chunk_store(&config.paths.chunks_root);
        assert!(codes(&issues).contains(&"chunk_release_mismatch"));
    }

    #[tokio::test]
    async fn renamed_chunk_file_is_reported() {
        let (config, temp) = seeded_config().await;
        let chunk_dir = temp.path().join("chunks/tf/r1");
        let chunk_path = fs::read_dir(&chunk_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        fs::rename(&chunk_path, chunk_dir.join("chk_000000000000000000000000.json")).unwrap();

        let issues = run_all_gates(&config.paths);
        let found = codes(&issues);
        assert!(found.contains(&"chunk_id_mismatch"));
        // The index now points at a chunk file that no longer exists.
        assert!(found.contains(&"index_missing_chunk_file"));
    }

    #[tokio::test]
    async fn malformed_index_row_is_reported() {
        let (config, temp) = seeded_config().await;
        let index_path = temp.path().join("vector_index/tf/r1/index.jsonl");
        let mut raw = fs::read_to_string(&index_path).unwrap();
        raw.push_str("{not valid json\n");
        fs::write(&index_path, raw).unwrap();

        let issues = run_all_gates(&config.paths);
        assert!(codes(&issues).contains(&"index_row_invalid"));
    }

    #[tokio::test]
    async fn unsupported_embedding_ref_is_reported() {
        let (config, temp) = seeded_config().await;
        let index_path = temp.path().join("vector_index/tf/r1/index.jsonl");
        let raw = fs::read_to_string(&index_path).unwrap();
        let rewritten: String = raw
            .lines()
            .map(|line| {
                let mut row: serde_json::Value = serde_json::from_str(line).unwrap();
                row["embedding_ref"] = serde_json::json!("s3://bucket/vector");
                format!("{row}\n")
            })
            .collect();
        fs::write(&index_path, rewritten).unwrap();

        let issues = run_all_gates(&config.paths);
        assert!(codes(&issues).contains(&"index_embedding_ref_invalid"));
    }

    #[tokio::test]
    async fn corrupted_release_record_is_reported() {
        let (config, temp) = seeded_config().await;
        let release_path = temp.path().join("releases/tf/releases/r1/release.json");
        fs::write(&release_path, "{\"release_id\": 42}").unwrap();

        let issues = run_all_gates(&config.paths);
        assert!(codes(&issues).contains(&"release_schema_invalid"));
    }

    #[tokio::test]
    async fn embedding_outside_root_is_reported() {
        let (config, temp) = seeded_config().await;

        // Move the embedding file out of the embeddings root and
        // repoint the index row at the new location.
        let emb_dir = temp.path().join("embeddings/tf/r1");
        let emb_path = fs::read_dir(&emb_dir).unwrap().next().unwrap().unwrap().path();
        let outside = temp.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        let moved = outside.join(emb_path.file_name().unwrap());
        fs::rename(&emb_path, &moved).unwrap();

        let index_path = temp.path().join("vector_index/tf/r1/index.jsonl");
        let raw = fs::read_to_string(&index_path).unwrap();
        let rewritten: String = raw
            .lines()
            .map(|line| {
                let mut row: serde_json::Value = serde_json::from_str(line).unwrap();
                row["embedding_ref"] = serde_json::json!(format!("file:{}", moved.display()));
                format!("{row}\n")
            })
            .collect();
        fs::write(&index_path, rewritten).unwrap();

        let issues = run_all_gates(&config.paths);
        assert!(codes(&issues).contains(&"embedding_outside_root"));
    }
}
