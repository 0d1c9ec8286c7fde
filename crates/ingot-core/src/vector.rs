//! Domain- and release-scoped vector index.
//!
//! The default store keeps one `index.jsonl` per `(domain, release_id)`
//! under the vector index root. Rows are kept sorted by `chunk_id` so
//! any successful upsert leaves a totally ordered, byte-reproducible
//! file; queries stream rows, dereference each `embedding_ref`, and
//! rank by cosine similarity.
//!
//! Cross-domain leakage is prevented by construction: every index file
//! is scoped to a single `(domain, release_id)` and upserts reject
//! chunks whose scope does not match.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{validate_slug, write_atomic};
use crate::types::{AlignmentTags, Chunk};
use crate::{Error, Result};

/// One line of `index.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRow {
    /// Chunk identity; unique within the file.
    pub chunk_id: String,
    /// Tenant namespace; matches the path.
    pub domain: String,
    /// Owning release; matches the path.
    pub release_id: String,
    /// Chunk text, denormalized for result assembly.
    pub text: String,
    /// Pointer to the persisted vector (`file:<path>`).
    pub embedding_ref: String,
    /// Filter keys, present when set on the source chunk.
    #[serde(flatten)]
    pub tags: AlignmentTags,
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    /// Chunk identity.
    pub chunk_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Owning release.
    pub release_id: String,
    /// Chunk text.
    pub text: String,
    /// Pointer to the persisted vector.
    pub embedding_ref: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
    /// Filter keys carried through from the row.
    #[serde(flatten)]
    pub tags: AlignmentTags,
}

impl QueryHit {
    fn from_row(row: IndexRow, score: f32) -> Self {
        Self {
            chunk_id: row.chunk_id,
            domain: row.domain,
            release_id: row.release_id,
            text: row.text,
            embedding_ref: row.embedding_ref,
            score,
            tags: row.tags,
        }
    }
}

/// Capability interface for vector index backends.
///
/// Alternate implementations must honor the same contract: scope
/// enforcement on upsert, filter equality semantics, and the
/// `(-score, chunk_id)` result order.
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Insert or overwrite rows for the given chunks.
    fn upsert(&self, domain: &str, release_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Filtered top-k cosine query.
    fn query(
        &self,
        domain: &str,
        release_id: &str,
        query_vector: &[f32],
        filters: Option<&AlignmentTags>,
        top_k: usize,
    ) -> Result<Vec<QueryHit>>;
}

/// Select a vector store implementation by configured adapter name.
///
/// The empty string or `local` picks the JSONL store; anything else is
/// a configuration error (implementations are compiled in, not loaded
/// at runtime).
pub fn build_vector_store(adapter: &str, root: PathBuf) -> Result<Box<dyn VectorStore>> {
    match adapter {
        "" | "local" => Ok(Box::new(LocalJsonlVectorStore::new(root))),
        other => Err(Error::Config(format!(
            "unknown vector store adapter '{other}'"
        ))),
    }
}

/// Cosine similarity; zero-norm or mismatched inputs score 0.0.
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Dereference an `embedding_ref` and load its vector.
///
/// `file:<path>` is the only supported scheme; anything else resolves
/// to an empty vector (which scores 0.0 everywhere).
pub fn load_vector_from_ref(embedding_ref: &str) -> Result<Vec<f32>> {
    let Some(path) = embedding_ref.strip_prefix("file:") else {
        return Ok(Vec::new());
    };
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read embedding {path}: {e}")))?;
    let payload: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| Error::Storage(format!("Failed to parse embedding {path}: {e}")))?;
    let Some(values) = payload.get("vector").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };
    Ok(values
        .iter()
        .filter_map(serde_json::Value::as_f64)
        .map(|f| f as f32)
        .collect())
}

/// Per-index write locks; concurrent in-process upserts to the same
/// release serialize instead of losing rows.
static INDEX_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn index_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = INDEX_LOCKS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    locks
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Local, file-backed vector store with deterministic output.
#[derive(Debug, Clone)]
pub struct LocalJsonlVectorStore {
    root: PathBuf,
}

impl LocalJsonlVectorStore {
    /// Create a store over the vector index root.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_path(&self, domain: &str, release_id: &str) -> PathBuf {
        self.root.join(domain).join(release_id).join("index.jsonl")
    }

    fn read_existing(path: &Path) -> BTreeMap<String, IndexRow> {
        let mut rows = BTreeMap::new();
        let Ok(file) = fs::File::open(path) else {
            return rows;
        };
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(row) = serde_json::from_str::<IndexRow>(line) {
                if !row.chunk_id.is_empty() {
                    rows.insert(row.chunk_id.clone(), row);
                }
            }
        }
        rows
    }

    fn validate_chunk(chunk: &Chunk, domain: &str, release_id: &str) -> Result<()> {
        if chunk.domain != domain {
            return Err(Error::Validation(
                "chunk domain does not match upsert domain".to_string(),
            ));
        }
        if chunk.release_id != release_id {
            return Err(Error::Validation(
                "chunk release_id does not match upsert release_id".to_string(),
            ));
        }
        if chunk.chunk_id.is_empty() {
            return Err(Error::Validation("chunk_id is required".to_string()));
        }
        if chunk.text.is_empty() {
            return Err(Error::Validation("text is required".to_string()));
        }
        if chunk
            .embedding_ref
            .as_deref()
            .is_none_or(str::is_empty)
        {
            return Err(Error::Validation(
                "embedding_ref is required for indexing".to_string(),
            ));
        }
        Ok(())
    }
}

impl VectorStore for LocalJsonlVectorStore {
    fn upsert(&self, domain: &str, release_id: &str, chunks: &[Chunk]) -> Result<()> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        for chunk in chunks {
            Self::validate_chunk(chunk, domain, release_id)?;
        }

        let path = self.index_path(domain, release_id);
        let lock = index_lock(&path);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut rows = Self::read_existing(&path);
        for chunk in chunks {
            let row = IndexRow {
                chunk_id: chunk.chunk_id.clone(),
                domain: domain.to_string(),
                release_id: release_id.to_string(),
                text: chunk.text.clone(),
                // Presence checked above.
                embedding_ref: chunk.embedding_ref.clone().unwrap_or_default(),
                tags: chunk.tags.normalized(),
            };
            rows.insert(row.chunk_id.clone(), row);
        }

        let mut out = String::new();
        for row in rows.values() {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        write_atomic(&path, &out)?;
        debug!(
            "Upserted {} rows into {} ({} total)",
            chunks.len(),
            path.display(),
            rows.len()
        );
        Ok(())
    }

    fn query(
        &self,
        domain: &str,
        release_id: &str,
        query_vector: &[f32],
        filters: Option<&AlignmentTags>,
        top_k: usize,
    ) -> Result<Vec<QueryHit>> {
        validate_slug("domain", domain)?;
        validate_slug("release_id", release_id)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let path = self.index_path(domain, release_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let filters = filters.map(AlignmentTags::normalized).unwrap_or_default();
        let file = fs::File::open(&path)?;
        let mut candidates: Vec<QueryHit> = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(row) = serde_json::from_str::<IndexRow>(line) else {
                continue;
            };
            if !row.tags.matches(&filters) {
                continue;
            }
            let vector = load_vector_from_ref(&row.embedding_ref)?;
            let score = cosine(query_vector, &vector);
            candidates.push(QueryHit::from_row(row, score));
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        candidates.truncate(top_k);
        Ok(candidates)
    }
}

/// Offline accelerator: one index and all referenced vectors preloaded
/// for fast repeated queries. Same ranking contract as the file store.
#[derive(Debug, Clone)]
pub struct InMemoryVectorIndex {
    domain: String,
    release_id: String,
    items: Vec<(IndexRow, Vec<f32>)>,
}

impl InMemoryVectorIndex {
    /// Scoped domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Scoped release.
    #[must_use]
    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    /// Number of preloaded rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the index had no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Filtered top-k cosine query over the preloaded rows.
    #[must_use]
    pub fn query(
        &self,
        query_vector: &[f32],
        filters: Option<&AlignmentTags>,
        top_k: usize,
    ) -> Vec<QueryHit> {
        if top_k == 0 {
            return Vec::new();
        }
        let filters = filters.map(AlignmentTags::normalized).unwrap_or_default();
        let mut candidates: Vec<QueryHit> = self
            .items
            .iter()
            .filter(|(row, _)| row.tags.matches(&filters))
            .map(|(row, vector)| QueryHit::from_row(row.clone(), cosine(query_vector, vector)))
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        candidates.truncate(top_k);
        candidates
    }
}

/// Load one release's index and every referenced embedding file.
pub fn load_in_memory_index(
    root: &Path,
    domain: &str,
    release_id: &str,
) -> Result<InMemoryVectorIndex> {
    validate_slug("domain", domain)?;
    validate_slug("release_id", release_id)?;

    let path = root.join(domain).join(release_id).join("index.jsonl");
    let mut items = Vec::new();
    if path.exists() {
        let file = fs::File::open(&path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(row) = serde_json::from_str::<IndexRow>(line) else {
                continue;
            };
            let vector = load_vector_from_ref(&row.embedding_ref)?;
            items.push((row, vector));
        }
    }
    Ok(InMemoryVectorIndex {
        domain: domain.to_string(),
        release_id: release_id.to_string(),
        items,
    })
}
