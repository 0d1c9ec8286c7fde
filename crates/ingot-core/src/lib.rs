//! # ingot-core
//!
//! Core functionality for ingot - a domain-scoped content ingestion and
//! retrieval service.
//!
//! Raw HTML (or raw documents) enter at one end; at the other end a
//! semantic-search query returns ranked text chunks drawn from an
//! immutable, promotable release of processed content. Each domain is
//! an isolated tenant: artifacts never cross domain boundaries, and a
//! domain has at most one *active* release visible to retrieval.
//!
//! ## Architecture
//!
//! The pipeline is a deterministic multi-stage transformation whose
//! outputs are content-addressed and reproducible:
//!
//! ```text
//! HTML → distilled sections → canonical objects → chunks → vectors → index
//! ```
//!
//! Around that core sit the release lifecycle (create / promote /
//! merge), the retrieval path (active-release resolution + filtered
//! cosine search), offline gates that cross-validate every stored
//! artifact, and a per-domain observability log.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ingot_core::{Config, IngestionRequest, Pipeline};
//!
//! # async fn demo() -> ingot_core::Result<()> {
//! let config = Config::from_env()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let outcome = pipeline
//!     .run(&IngestionRequest {
//!         domain: "terraform".into(),
//!         source_id: "intro".into(),
//!         release_id: "terraform_20260801-120000_0a1b2c3d".into(),
//!         raw_html: "<h1>Install</h1><p>Run terraform init.</p>".into(),
//!         created_by: None,
//!         write_release: true,
//!     })
//!     .await?;
//! println!("indexed {} chunks", outcome.counts.chunks);
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! For fixed inputs, every generated id, artifact file, and index byte
//! is identical across runs. Re-running a failed ingestion converges on
//! the same files; retries need no rollback.

/// Batch ingestion and release merging
pub mod batch;
/// Canonicalization of kept sections
pub mod canonical;
/// Raw document capture and quarantine
pub mod capture;
/// Deterministic HTML cleaning
pub mod cleaner;
/// Section classification and drop rules
pub mod classifier;
/// Environment-driven configuration
pub mod config;
/// Deterministic HTML distillation
pub mod distiller;
/// Deterministic chunking of canonical objects
pub mod chunker;
/// Embedding providers and the embedding file store
pub mod embedder;
/// Error types and result aliases
pub mod error;
/// Offline schema / scope / cross-reference gates
pub mod gates;
/// Keyed integrity signatures
pub mod integrity;
/// Per-domain event log, counters, and summaries
pub mod observability;
/// Pipeline orchestration for one ingestion run
pub mod pipeline;
/// Release lifecycle and audit log
pub mod releases;
/// Retrieval over the active release
pub mod retrieval;
/// Hierarchical on-disk content store
pub mod store;
/// Core data types for persisted artifacts
pub mod types;
/// Hashing and id-derivation helpers
pub mod util;
/// Domain- and release-scoped vector index
pub mod vector;

// Re-export commonly used types
pub use batch::{
    run_batch, BatchInput, BatchItem, BatchOptions, BatchReport, BatchStatus, ItemResult,
    merge_releases, MergeReport,
};
pub use canonical::{canonicalize_sections, persist_canonical_objects};
pub use capture::{CaptureOptions, CaptureService};
pub use chunker::{chunk_canonical_objects, persist_chunks, DEFAULT_MAX_CHARS};
pub use classifier::{classify_section, filter_instructional, Classification};
pub use cleaner::clean_html_text;
pub use config::{Config, EmbeddingConfig, ProviderKind, StorePaths};
pub use distiller::distill_sections;
pub use embedder::{
    attach_embeddings, build_provider, DeterministicEmbedder, EmbeddingProvider,
    FileEmbeddingStore, OllamaEmbedder,
};
pub use error::{Error, Result};
pub use gates::{run_all_gates, GateIssue};
pub use integrity::Signer;
pub use observability::{ObservabilityEvent, ObservabilityStore, Summary};
pub use pipeline::{IngestionOutcome, IngestionRequest, Pipeline};
pub use releases::{generate_release_id, ReleaseManager};
pub use retrieval::{RetrievalResponse, RetrievalService};
pub use store::ContentStore;
pub use types::*;
pub use vector::{
    build_vector_store, load_in_memory_index, InMemoryVectorIndex, IndexRow,
    LocalJsonlVectorStore, QueryHit, VectorStore,
};
