//! Ingestion pipeline: one `(domain, source, release)` run.
//!
//! Drives distill → classify → canonicalize → chunk → embed → index,
//! persisting artifacts at every stage, and optionally writes the
//! release record. Every artifact is content-addressed, so a failed or
//! repeated run leaves nothing inconsistent behind: retries re-converge
//! on identical files.

use serde::Serialize;

use crate::canonical::{canonicalize_sections, persist_canonical_objects};
use crate::chunker::{chunk_canonical_objects, persist_chunks, DEFAULT_MAX_CHARS};
use crate::classifier::filter_instructional;
use crate::config::Config;
use crate::distiller::distill_sections;
use crate::embedder::{attach_embeddings, build_provider, EmbeddingProvider, FileEmbeddingStore};
use crate::observability::ObservabilityStore;
use crate::releases::ReleaseManager;
use crate::store::ContentStore;
use crate::types::{IngestionCounts, ReleaseRecord};
use crate::util::sha256_hex;
use crate::vector::{build_vector_store, VectorStore};
use crate::{Error, Result};

/// Inputs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    /// Tenant namespace.
    pub domain: String,
    /// Logical source document id.
    pub source_id: String,
    /// Release the artifacts belong to.
    pub release_id: String,
    /// Raw HTML payload.
    pub raw_html: String,
    /// Attribution for the release record.
    pub created_by: Option<String>,
    /// Whether to write a release record (batch runs write one once,
    /// up front).
    pub write_release: bool,
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    /// Always `ok` for a completed run.
    pub status: String,
    /// Tenant namespace.
    pub domain: String,
    /// Release the artifacts were written under.
    pub release_id: String,
    /// The release record, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseRecord>,
    /// Per-stage artifact counts.
    pub counts: IngestionCounts,
}

/// Orchestrates the release-scoped content pipeline.
pub struct Pipeline {
    store: ContentStore,
    releases: ReleaseManager,
    observability: ObservabilityStore,
    embedder: Box<dyn EmbeddingProvider>,
    embedding_store: FileEmbeddingStore,
    vector_store: Box<dyn VectorStore>,
    max_chunk_chars: usize,
}

impl Pipeline {
    /// Wire up a pipeline from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            store: ContentStore::new(config.paths.clone()),
            releases: ReleaseManager::new(config.paths.releases_root.clone()),
            observability: ObservabilityStore::new(config.paths.observability_root.clone()),
            embedder: build_provider(config.embedding.ingestion_provider, &config.embedding)?,
            embedding_store: FileEmbeddingStore::new(config.paths.embeddings_root.clone())?,
            vector_store: build_vector_store(
                &config.vector_store_adapter,
                config.paths.vector_index_root.clone(),
            )?,
            max_chunk_chars: DEFAULT_MAX_CHARS,
        })
    }

    /// The release manager this pipeline writes through.
    #[must_use]
    pub const fn releases(&self) -> &ReleaseManager {
        &self.releases
    }

    /// The observability store this pipeline records into.
    #[must_use]
    pub const fn observability(&self) -> &ObservabilityStore {
        &self.observability
    }

    /// Run one ingestion and record its outcome event.
    ///
    /// Any stage error aborts the run; partial artifacts may remain on
    /// disk and are harmless (content-addressed names, identical
    /// bytes on retry).
    pub async fn run(&self, request: &IngestionRequest) -> Result<IngestionOutcome> {
        let result = self.run_inner(request).await;
        let mut fields = serde_json::Map::new();
        fields.insert(
            "release_id".to_string(),
            serde_json::json!(request.release_id),
        );
        fields.insert(
            "source_id".to_string(),
            serde_json::json!(request.source_id),
        );
        match &result {
            Ok(_) => {
                self.observability.record_event(
                    &request.domain,
                    "ingestion_run",
                    "success",
                    "INFO",
                    fields,
                )?;
            },
            Err(err) => {
                fields.insert("error".to_string(), serde_json::json!(err.to_string()));
                // Best effort: the pipeline error wins over a logging error.
                let _ = self.observability.record_event(
                    &request.domain,
                    "ingestion_run",
                    "error",
                    "ERROR",
                    fields,
                );
            },
        }
        result
    }

    async fn run_inner(&self, request: &IngestionRequest) -> Result<IngestionOutcome> {
        if request.domain.trim().is_empty() {
            return Err(Error::Validation("domain is required".to_string()));
        }
        if request.source_id.trim().is_empty() {
            return Err(Error::Validation("source_id is required".to_string()));
        }
        if request.release_id.trim().is_empty() {
            return Err(Error::Validation("release_id is required".to_string()));
        }
        if request.raw_html.trim().is_empty() {
            return Err(Error::Validation("raw_html is required".to_string()));
        }

        let domain = request.domain.as_str();
        let release_id = request.release_id.as_str();
        let source_hash = sha256_hex(&request.raw_html);

        let sections = distill_sections(&request.raw_html, domain, &source_hash);
        let sections_total = sections.len();

        let (kept, _dropped) = filter_instructional(sections);
        let sections_kept = kept.len();

        let canonical = canonicalize_sections(kept, domain, &request.source_id, release_id);
        persist_canonical_objects(&self.store, &canonical)?;

        let chunks =
            chunk_canonical_objects(&canonical, domain, release_id, self.max_chunk_chars);
        persist_chunks(&self.store, &chunks)?;

        let embedded =
            attach_embeddings(&chunks, self.embedder.as_ref(), &self.embedding_store).await?;
        self.vector_store.upsert(domain, release_id, &embedded)?;

        let release = if request.write_release {
            let mut payload = serde_json::Map::new();
            payload.insert(
                "source_id".to_string(),
                serde_json::json!(request.source_id),
            );
            payload.insert("source_hash".to_string(), serde_json::json!(source_hash));
            payload.insert(
                "stats".to_string(),
                serde_json::json!({
                    "sections_total": sections_total,
                    "sections_kept": sections_kept,
                    "canonical_objects": canonical.len(),
                    "chunks": chunks.len(),
                }),
            );
            Some(self.releases.create_release(
                domain,
                release_id,
                request.created_by.as_deref(),
                Some(payload),
            )?)
        } else {
            None
        };

        Ok(IngestionOutcome {
            status: "ok".to_string(),
            domain: domain.to_string(),
            release_id: release_id.to_string(),
            release,
            counts: IngestionCounts {
                sections_total,
                sections_kept,
                canonical_objects: canonical.len(),
                chunks: chunks.len(),
                embeddings: embedded.len(),
            },
        })
    }
}
