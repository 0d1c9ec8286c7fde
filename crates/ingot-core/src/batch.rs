//! Batch ingestion and release merging.
//!
//! Batch runs aggregate many items into one release: the release record
//! is written once up front, then each item runs through the pipeline
//! with `write_release` off. Merging folds several releases into a new
//! one by copying artifacts and deduplicating index rows (first source
//! wins by chunk id).

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::capture::{CaptureOptions, CaptureService};
use crate::pipeline::{IngestionRequest, Pipeline};
use crate::releases::{generate_release_id, ReleaseManager};
use crate::store::{validate_slug, write_atomic, ContentStore};
use crate::types::{CanonicalObject, Chunk, EmbeddingRecord, IngestionCounts};
use crate::vector::IndexRow;
use crate::{Error, Result};

/// Where one batch item's raw HTML comes from.
#[derive(Debug, Clone)]
pub enum BatchInput {
    /// Inline raw HTML.
    RawHtml(String),
    /// Path to a local HTML file.
    FilePath(PathBuf),
    /// Id of a stored capture.
    CaptureId(String),
    /// URL to capture first, then ingest. The capture is stored under
    /// the item's source id.
    Url(String),
}

/// One batch item.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Logical source id for the item.
    pub source_id: String,
    /// Input payload location.
    pub input: BatchInput,
}

/// Batch run options.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Reuse this release id instead of generating one.
    pub release_id: Option<String>,
    /// Attribution for the release record.
    pub created_by: Option<String>,
    /// Keep going after item failures.
    pub continue_on_error: bool,
    /// Allow quarantined or failed captures as input.
    pub force: bool,
}

/// Outcome of one batch item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    /// The item's source id.
    pub source_id: String,
    /// Whether the item ingested cleanly.
    pub ok: bool,
    /// Stage counts, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<IngestionCounts>,
    /// Failure message, on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall batch status.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Every item succeeded.
    Success,
    /// Some items succeeded.
    Partial,
    /// No item succeeded.
    Failed,
}

/// Aggregated batch report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Overall status.
    pub status: BatchStatus,
    /// Tenant namespace.
    pub domain: String,
    /// Release all items were ingested under.
    pub release_id: String,
    /// Per-item outcomes, in input order.
    pub items: Vec<ItemResult>,
    /// Counts summed over successful items.
    pub totals: IngestionCounts,
}

/// Ingest many items into one release.
///
/// With `continue_on_error` unset, the run stops at the first failing
/// item; earlier results are preserved in the report either way.
pub async fn run_batch(
    pipeline: &Pipeline,
    captures: &CaptureService,
    domain: &str,
    items: &[BatchItem],
    options: &BatchOptions,
) -> Result<BatchReport> {
    validate_slug("domain", domain)?;

    let release_id = options
        .release_id
        .clone()
        .unwrap_or_else(|| generate_release_id(domain));
    let mut payload = serde_json::Map::new();
    payload.insert("mode".to_string(), serde_json::json!("batch"));
    payload.insert("items".to_string(), serde_json::json!(items.len()));
    pipeline.releases().create_release(
        domain,
        &release_id,
        options.created_by.as_deref(),
        Some(payload),
    )?;

    let mut results: Vec<ItemResult> = Vec::with_capacity(items.len());
    let mut totals = IngestionCounts::default();

    for item in items {
        let outcome = ingest_item(pipeline, captures, domain, &release_id, item, options).await;
        match outcome {
            Ok(counts) => {
                totals.absorb(&counts);
                results.push(ItemResult {
                    source_id: item.source_id.clone(),
                    ok: true,
                    counts: Some(counts),
                    error: None,
                });
            },
            Err(err) => {
                results.push(ItemResult {
                    source_id: item.source_id.clone(),
                    ok: false,
                    counts: None,
                    error: Some(err.to_string()),
                });
                if !options.continue_on_error {
                    break;
                }
            },
        }
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    let failed = results.len() - succeeded;
    let status = if failed == 0 {
        BatchStatus::Success
    } else if succeeded > 0 {
        BatchStatus::Partial
    } else {
        BatchStatus::Failed
    };
    info!(
        "Batch {}/{}: {} ok, {} failed",
        domain,
        release_id,
        succeeded,
        failed
    );

    Ok(BatchReport {
        status,
        domain: domain.to_string(),
        release_id,
        items: results,
        totals,
    })
}

async fn ingest_item(
    pipeline: &Pipeline,
    captures: &CaptureService,
    domain: &str,
    release_id: &str,
    item: &BatchItem,
    options: &BatchOptions,
) -> Result<IngestionCounts> {
    let raw_html = match &item.input {
        BatchInput::RawHtml(html) => html.clone(),
        BatchInput::FilePath(path) => {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "input file '{}' not found",
                    path.display()
                )));
            }
            fs::read_to_string(path)?
        },
        BatchInput::CaptureId(capture_id) => {
            captures.raw_payload_for_ingestion(domain, capture_id, options.force)?
        },
        BatchInput::Url(url) => {
            captures
                .capture_url(domain, &item.source_id, url, &CaptureOptions::default())
                .await?;
            captures.raw_payload_for_ingestion(domain, &item.source_id, options.force)?
        },
    };

    let outcome = pipeline
        .run(&IngestionRequest {
            domain: domain.to_string(),
            source_id: item.source_id.clone(),
            release_id: release_id.to_string(),
            raw_html,
            created_by: options.created_by.clone(),
            write_release: false,
        })
        .await?;
    Ok(outcome.counts)
}

/// Outcome of a release merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// The merged release.
    pub target_release_id: String,
    /// Rows in the target index.
    pub rows_written: usize,
    /// Rows skipped because an earlier source owned the chunk id.
    pub duplicates_skipped: usize,
    /// Source releases, in merge order.
    pub source_releases: Vec<String>,
}

/// Merge several releases of one domain into a new release.
///
/// Index rows are taken in source order with first-wins semantics per
/// chunk id; chunk and embedding files are copied with their scope
/// rewritten to the target. A missing chunk or embedding file, or an
/// unsupported `embedding_ref` scheme, is fatal.
pub fn merge_releases(
    store: &ContentStore,
    releases: &ReleaseManager,
    domain: &str,
    source_release_ids: &[String],
    target_release_id: Option<&str>,
    created_by: Option<&str>,
) -> Result<MergeReport> {
    validate_slug("domain", domain)?;
    if source_release_ids.len() < 2 {
        return Err(Error::Validation(
            "merge requires at least two source releases".to_string(),
        ));
    }

    let target = target_release_id.map_or_else(|| generate_release_id(domain), ToString::to_string);
    let mut payload = serde_json::Map::new();
    payload.insert("mode".to_string(), serde_json::json!("merge"));
    payload.insert(
        "source_releases".to_string(),
        serde_json::json!(source_release_ids),
    );
    releases.create_release(domain, &target, created_by, Some(payload))?;

    copy_canonical_objects(store, domain, source_release_ids, &target)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<IndexRow> = Vec::new();
    let mut duplicates_skipped = 0;

    for source_release in source_release_ids {
        let index_path = store.index_path(domain, source_release)?;
        if !index_path.exists() {
            debug!("Merge source {} has no index", source_release);
            continue;
        }
        for line in fs::read_to_string(&index_path)?.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(row) = serde_json::from_str::<IndexRow>(line) else {
                continue;
            };
            if seen.contains(&row.chunk_id) {
                duplicates_skipped += 1;
                continue;
            }
            let merged = merge_row(store, domain, source_release, &target, row)?;
            seen.insert(merged.chunk_id.clone());
            rows.push(merged);
        }
    }

    rows.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
    let mut out = String::new();
    for row in &rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    write_atomic(&store.index_path(domain, &target)?, &out)?;

    info!(
        "Merged {} releases into {}/{} ({} rows, {} duplicates)",
        source_release_ids.len(),
        domain,
        target,
        rows.len(),
        duplicates_skipped
    );
    Ok(MergeReport {
        target_release_id: target,
        rows_written: rows.len(),
        duplicates_skipped,
        source_releases: source_release_ids.to_vec(),
    })
}

/// Best-effort copy of canonical objects into the target release.
/// Existing destination files are left alone; unparseable sources are
/// skipped.
fn copy_canonical_objects(
    store: &ContentStore,
    domain: &str,
    source_release_ids: &[String],
    target: &str,
) -> Result<()> {
    for source_release in source_release_ids {
        let dir = store.canonical_dir(domain, source_release)?;
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(mut object) = serde_json::from_str::<CanonicalObject>(&raw) else {
                continue;
            };
            let dest = store.canonical_path(domain, target, &object.id)?;
            if dest.exists() {
                continue;
            }
            object.domain = domain.to_string();
            object.provenance.release_id = target.to_string();
            store.write_json(&dest, &object)?;
        }
    }
    Ok(())
}

/// Copy one row's chunk and embedding into the target release and
/// return the rewritten row.
fn merge_row(
    store: &ContentStore,
    domain: &str,
    source_release: &str,
    target: &str,
    mut row: IndexRow,
) -> Result<IndexRow> {
    let chunk_path = store.chunk_path(domain, source_release, &row.chunk_id)?;
    if !chunk_path.exists() {
        return Err(Error::Integrity(format!(
            "chunk file missing during merge: {}",
            chunk_path.display()
        )));
    }
    let mut chunk: Chunk = store.read_json(&chunk_path)?;
    chunk.domain = domain.to_string();
    chunk.release_id = target.to_string();
    store.write_json(&store.chunk_path(domain, target, &chunk.chunk_id)?, &chunk)?;

    let Some(embedding_path) = row.embedding_ref.strip_prefix("file:") else {
        return Err(Error::Integrity(format!(
            "unsupported embedding_ref during merge: {}",
            row.embedding_ref
        )));
    };
    let embedding_path = PathBuf::from(embedding_path);
    if !embedding_path.exists() {
        return Err(Error::Integrity(format!(
            "embedding file missing during merge: {}",
            embedding_path.display()
        )));
    }
    let mut record: EmbeddingRecord = store.read_json(&embedding_path)?;
    record.domain = domain.to_string();
    record.release_id = target.to_string();

    let file_name = embedding_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::Integrity(format!(
                "embedding path has no file name: {}",
                embedding_path.display()
            ))
        })?;
    let dest = store.embeddings_dir(domain, target)?.join(file_name);
    store.write_json(&dest, &record)?;

    row.release_id = target.to_string();
    row.domain = domain.to_string();
    row.embedding_ref = format!("file:{}", dest.display());
    Ok(row)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunker::persist_chunks;
    use crate::config::Config;
    use crate::embedder::FileEmbeddingStore;
    use crate::integrity::Signer;
    use crate::observability::ObservabilityStore;
    use crate::types::AlignmentTags;
    use crate::vector::{LocalJsonlVectorStore, VectorStore};
    use tempfile::TempDir;

    const HTML: &str = "<h1>Install Guide</h1>\
        <p>Run the install command to configure the service.</p>";

    struct Fixture {
        temp: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = Config::with_data_root(temp.path().to_path_buf());
            Self { temp, config }
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::from_config(&self.config).unwrap()
        }

        fn captures(&self) -> CaptureService {
            CaptureService::new(
                ContentStore::new(self.config.paths.clone()),
                Signer::new(Some("s")),
                ObservabilityStore::new(self.config.paths.observability_root.clone()),
            )
            .unwrap()
        }

        fn content(&self) -> ContentStore {
            ContentStore::new(self.config.paths.clone())
        }

        fn releases(&self) -> ReleaseManager {
            ReleaseManager::new(self.config.paths.releases_root.clone())
        }

        /// Write a fully-indexed chunk into a release, bypassing the
        /// pipeline so chunk ids can be shared across releases.
        fn seed_chunk(&self, release_id: &str, chunk_id: &str, text: &str, vector: &[f32]) {
            let embeddings =
                FileEmbeddingStore::new(self.config.paths.embeddings_root.clone()).unwrap();
            let reference = embeddings.put("tf", release_id, chunk_id, vector).unwrap();
            let chunk = Chunk {
                chunk_id: chunk_id.to_string(),
                domain: "tf".to_string(),
                release_id: release_id.to_string(),
                text: text.to_string(),
                tags: AlignmentTags::default(),
                embedding_ref: Some(reference),
            };
            persist_chunks(&self.content(), std::slice::from_ref(&chunk)).unwrap();
            let store =
                LocalJsonlVectorStore::new(self.config.paths.vector_index_root.clone());
            store.upsert("tf", release_id, &[chunk]).unwrap();
        }
    }

    #[tokio::test]
    async fn batch_aggregates_items_under_one_release() {
        let fx = Fixture::new();
        let items = vec![
            BatchItem {
                source_id: "s1".to_string(),
                input: BatchInput::RawHtml(HTML.to_string()),
            },
            BatchItem {
                source_id: "s2".to_string(),
                input: BatchInput::RawHtml(HTML.replace("Install", "Deploy")),
            },
        ];
        let report = run_batch(
            &fx.pipeline(),
            &fx.captures(),
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("rb".to_string()),
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(report.release_id, "rb");
        assert_eq!(report.items.len(), 2);
        assert!(report.items.iter().all(|i| i.ok));
        assert_eq!(report.totals.canonical_objects, 2);

        // One release record, written by the batch itself.
        let record = fx.releases().get_release("tf", "rb").unwrap();
        assert_eq!(record.extra.get("mode"), Some(&serde_json::json!("batch")));

        // Both items landed in the same index.
        let index = std::fs::read_to_string(
            fx.temp.path().join("vector_index/tf/rb/index.jsonl"),
        )
        .unwrap();
        assert_eq!(index.lines().count(), report.totals.chunks);
    }

    #[tokio::test]
    async fn batch_stops_on_error_unless_continuing() {
        let fx = Fixture::new();
        let items = vec![
            BatchItem {
                source_id: "bad".to_string(),
                input: BatchInput::FilePath(PathBuf::from("/nonexistent.html")),
            },
            BatchItem {
                source_id: "good".to_string(),
                input: BatchInput::RawHtml(HTML.to_string()),
            },
        ];

        let stopped = run_batch(
            &fx.pipeline(),
            &fx.captures(),
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("rb1".to_string()),
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(stopped.status, BatchStatus::Failed);
        assert_eq!(stopped.items.len(), 1);
        assert!(!stopped.items[0].ok);

        let continued = run_batch(
            &fx.pipeline(),
            &fx.captures(),
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("rb2".to_string()),
                continue_on_error: true,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(continued.status, BatchStatus::Partial);
        assert_eq!(continued.items.len(), 2);
        assert!(continued.items[1].ok);
    }

    #[tokio::test]
    async fn batch_respects_capture_quarantine_and_force() {
        let fx = Fixture::new();
        let captures = fx.captures();
        let input = fx.temp.path().join("in.html");
        std::fs::write(&input, HTML).unwrap();
        captures
            .capture_file("tf", "c1", &input, &crate::capture::CaptureOptions::default())
            .unwrap();
        captures.quarantine("tf", "c1", None).unwrap();

        let items = vec![BatchItem {
            source_id: "s1".to_string(),
            input: BatchInput::CaptureId("c1".to_string()),
        }];

        let blocked = run_batch(
            &fx.pipeline(),
            &captures,
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("rq".to_string()),
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(blocked.status, BatchStatus::Failed);
        assert!(blocked.items[0]
            .error
            .as_deref()
            .unwrap()
            .contains("quarantined"));

        let forced = run_batch(
            &fx.pipeline(),
            &captures,
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("rf".to_string()),
                force: true,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(forced.status, BatchStatus::Success);
    }

    #[tokio::test]
    async fn batch_url_items_capture_then_ingest() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let fx = Fixture::new();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HTML))
            .mount(&server)
            .await;

        let items = vec![BatchItem {
            source_id: "s1".to_string(),
            input: BatchInput::Url(server.uri()),
        }];
        let report = run_batch(
            &fx.pipeline(),
            &fx.captures(),
            "tf",
            &items,
            &BatchOptions {
                release_id: Some("ru".to_string()),
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.status, BatchStatus::Success);
        // The capture was stored under the item's source id.
        assert!(fx.temp.path().join("captures/tf/s1.html").exists());
        assert!(fx.temp.path().join("vector_index/tf/ru/index.jsonl").exists());
    }

    #[test]
    fn merge_deduplicates_by_chunk_id_first_wins() {
        let fx = Fixture::new();
        fx.seed_chunk("r1", "chk_dup", "shared text", &[1.0, 0.0]);
        fx.seed_chunk("r1", "chk_only1", "first only", &[0.5, 0.5]);
        fx.seed_chunk("r2", "chk_dup", "shared text", &[1.0, 0.0]);
        fx.seed_chunk("r2", "chk_only2", "second only", &[0.0, 1.0]);

        let report = merge_releases(
            &fx.content(),
            &fx.releases(),
            "tf",
            &["r1".to_string(), "r2".to_string()],
            Some("rm"),
            None,
        )
        .unwrap();
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.duplicates_skipped, 1);

        let index = std::fs::read_to_string(
            fx.temp.path().join("vector_index/tf/rm/index.jsonl"),
        )
        .unwrap();
        let rows: Vec<IndexRow> = index
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 3);
        // Sorted by chunk_id, rewritten to the target scope.
        let ids: Vec<&str> = rows.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["chk_dup", "chk_only1", "chk_only2"]);
        for row in &rows {
            assert_eq!(row.release_id, "rm");
            assert!(row.embedding_ref.contains("/rm/"));
            let vector = crate::vector::load_vector_from_ref(&row.embedding_ref).unwrap();
            assert!(!vector.is_empty());
        }

        // Chunk files were copied and rescoped.
        let chunk: Chunk = fx
            .content()
            .read_json(&fx.content().chunk_path("tf", "rm", "chk_dup").unwrap())
            .unwrap();
        assert_eq!(chunk.release_id, "rm");
    }

    #[test]
    fn merge_is_deterministic() {
        let fx = Fixture::new();
        fx.seed_chunk("r1", "chk_a", "alpha", &[1.0]);
        fx.seed_chunk("r2", "chk_b", "beta", &[0.5]);

        let sources = ["r1".to_string(), "r2".to_string()];
        merge_releases(&fx.content(), &fx.releases(), "tf", &sources, Some("rm"), None).unwrap();
        let first =
            std::fs::read(fx.temp.path().join("vector_index/tf/rm/index.jsonl")).unwrap();
        merge_releases(&fx.content(), &fx.releases(), "tf", &sources, Some("rm"), None).unwrap();
        let second =
            std::fs::read(fx.temp.path().join("vector_index/tf/rm/index.jsonl")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn merge_requires_two_sources() {
        let fx = Fixture::new();
        let err = merge_releases(
            &fx.content(),
            &fx.releases(),
            "tf",
            &["r1".to_string()],
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn merge_with_missing_embedding_is_fatal() {
        let fx = Fixture::new();
        fx.seed_chunk("r1", "chk_a", "alpha", &[1.0]);
        fx.seed_chunk("r2", "chk_b", "beta", &[0.5]);

        // Delete r2's embedding file out from under its index row.
        let dir = fx.temp.path().join("embeddings/tf/r2");
        for entry in std::fs::read_dir(&dir).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }

        let err = merge_releases(
            &fx.content(),
            &fx.releases(),
            "tf",
            &["r1".to_string(), "r2".to_string()],
            Some("rm"),
            None,
        )
        .unwrap_err();
        assert_eq!(err.category(), "integrity");
    }

    #[test]
    fn merge_copies_canonical_objects_rescoped() {
        let fx = Fixture::new();
        fx.seed_chunk("r1", "chk_a", "alpha", &[1.0]);
        fx.seed_chunk("r2", "chk_b", "beta", &[0.5]);

        let object = CanonicalObject {
            id: "clo_x".to_string(),
            domain: "tf".to_string(),
            title: "T".to_string(),
            body: vec!["alpha".to_string()],
            concepts: Vec::new(),
            provenance: crate::types::Provenance {
                source_id: "s1".to_string(),
                release_id: "r1".to_string(),
            },
            tags: AlignmentTags::default(),
        };
        let content = fx.content();
        content
            .write_json(&content.canonical_path("tf", "r1", "clo_x").unwrap(), &object)
            .unwrap();

        merge_releases(
            &content,
            &fx.releases(),
            "tf",
            &["r1".to_string(), "r2".to_string()],
            Some("rm"),
            None,
        )
        .unwrap();

        let copied: CanonicalObject = content
            .read_json(&content.canonical_path("tf", "rm", "clo_x").unwrap())
            .unwrap();
        assert_eq!(copied.provenance.release_id, "rm");
        assert_eq!(copied.domain, "tf");
    }
}
