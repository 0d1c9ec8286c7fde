//! Core data types for ingestion artifacts.
//!
//! Everything the pipeline persists is one of these tagged records.
//! Serialization uses serde with explicit field sets; unknown keys in
//! stored JSON are dropped on read rather than rejected.
//!
//! ## Identity scheme
//!
//! Artifact ids are content-derived and stable across runs:
//!
//! - `sec_<24hex>` — distilled section, from
//!   `domain|source_hash|kind|title|clean_text`
//! - `clo_<24hex>` — canonical object, from
//!   `domain|release_id|source_id|section_id`
//! - `chk_<24hex>` — chunk, from
//!   `domain|release_id|clo_id|chunk_index|text`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional alignment metadata propagated from canonical objects to
/// chunks and index rows, and used for filter enforcement at query
/// time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlignmentTags {
    /// Concept graph node this content aligns to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,
    /// Difficulty / audience level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Owning concept graph id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    /// Concept graph version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_version: Option<String>,
    /// Dataset version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_version: Option<String>,
    /// Index version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_version: Option<String>,
}

impl AlignmentTags {
    /// True when no tag is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.concept_id.is_none()
            && self.level.is_none()
            && self.graph_id.is_none()
            && self.graph_version.is_none()
            && self.dataset_version.is_none()
            && self.index_version.is_none()
    }

    /// Trim every tag and drop those that trim to empty.
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn norm(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        }
        Self {
            concept_id: norm(&self.concept_id),
            level: norm(&self.level),
            graph_id: norm(&self.graph_id),
            graph_version: norm(&self.graph_version),
            dataset_version: norm(&self.dataset_version),
            index_version: norm(&self.index_version),
        }
    }

    /// Filter-equality check: every tag set on `filters` must be
    /// present and equal on `self`.
    #[must_use]
    pub fn matches(&self, filters: &Self) -> bool {
        fn ok(actual: Option<&String>, required: Option<&String>) -> bool {
            required.is_none_or(|r| actual == Some(r))
        }
        ok(self.concept_id.as_ref(), filters.concept_id.as_ref())
            && ok(self.level.as_ref(), filters.level.as_ref())
            && ok(self.graph_id.as_ref(), filters.graph_id.as_ref())
            && ok(self.graph_version.as_ref(), filters.graph_version.as_ref())
            && ok(
                self.dataset_version.as_ref(),
                filters.dataset_version.as_ref(),
            )
            && ok(self.index_version.as_ref(), filters.index_version.as_ref())
    }
}

/// Snapshot of a fetched-or-uploaded raw document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    /// Logical input document identity within the domain.
    pub source_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Fetch URL, absent for file captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream HTTP status (synthetic 200 for file captures).
    pub http_status: u16,
    /// Response headers, sorted by name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Where the raw payload was written.
    pub raw_payload_path: String,
    /// `sha256:<hex>` over the raw payload.
    pub content_hash: String,
    /// `hmac-sha256:<hex>` over `content_hash`.
    pub content_signature: String,
    /// When the payload was retrieved.
    pub retrieved_at: DateTime<Utc>,
    /// Whether the capture is usable for ingestion.
    pub capture_ok: bool,
    /// Normalized plain text, when requested at capture time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,
    /// Quarantined captures are excluded from ingestion unless forced.
    pub quarantined: bool,
    /// Why the capture was quarantined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_reason: Option<String>,
    /// When the quarantine mark was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantined_at: Option<DateTime<Utc>>,
}

/// Section category assigned by distillation heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Step-by-step instructions.
    Howto,
    /// Worked example.
    Example,
    /// Term definition.
    Definition,
    /// Note / warning / caution callout.
    Note,
    /// Everything else.
    Explanation,
}

impl SectionKind {
    /// Lowercase name used in id derivation and classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Howto => "howto",
            Self::Example => "example",
            Self::Definition => "definition",
            Self::Note => "note",
            Self::Explanation => "explanation",
        }
    }
}

/// Pointer from distilled content back into the raw input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    /// `sha256` hex of the raw input this offset indexes into.
    pub source_hash: String,
    /// Byte range `[start, end)` in the raw input.
    pub offset: [usize; 2],
}

/// One distilled section candidate. Ephemeral: consumed by the
/// classifier and canonicalizer, never persisted standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistilledSection {
    /// Stable `sec_` id.
    pub section_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Heuristic category.
    pub kind: SectionKind,
    /// Heading text, when the section was opened by a heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Cleaned body text, blocks joined by blank lines.
    pub clean_text: String,
    /// Offsets of contributing blocks in the raw input.
    pub evidence: Vec<Evidence>,
}

/// Where a canonical object came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    /// Source document within the domain.
    pub source_id: String,
    /// Release the object was produced under.
    pub release_id: String,
}

/// Canonical learning object: a stable-identified, normalized section
/// with provenance. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalObject {
    /// Stable `clo_` id.
    pub id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Section title or derived first line.
    pub title: String,
    /// Paragraphs, in order.
    pub body: Vec<String>,
    /// Linked concept ids (reserved; empty in v1).
    pub concepts: Vec<String>,
    /// Source and release attribution.
    pub provenance: Provenance,
    /// Optional alignment metadata propagated to chunks.
    #[serde(flatten)]
    pub tags: AlignmentTags,
}

/// A bounded-size text unit derived from a canonical object body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable `chk_` id.
    pub chunk_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Owning release.
    pub release_id: String,
    /// Chunk text; at most `max_chars` characters.
    pub text: String,
    /// Alignment metadata inherited from the canonical object.
    #[serde(flatten)]
    pub tags: AlignmentTags,
    /// Reference to the persisted vector, attached after embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_ref: Option<String>,
}

/// Persisted embedding payload referenced by `embedding_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Chunk this vector belongs to.
    pub chunk_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Owning release.
    pub release_id: String,
    /// The vector itself.
    pub vector: Vec<f32>,
}

/// Release record metadata. Caller payload (stats, mode tags, source
/// attribution) rides along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Release identity.
    pub release_id: String,
    /// Tenant namespace.
    pub domain: String,
    /// Operator or system that created the release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Mode-specific payload merged in at creation.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Append-only audit record of a promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the promotion happened.
    pub timestamp: DateTime<Utc>,
    /// Always `security_release_promoted`.
    pub event: String,
    /// Tenant namespace.
    pub domain: String,
    /// Newly active release.
    pub release_id: String,
    /// Previously active release, if any.
    pub previous_release_id: Option<String>,
    /// Who promoted.
    pub actor: Option<String>,
    /// Why.
    pub reason: Option<String>,
}

/// Stage counts reported by an ingestion run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionCounts {
    /// Sections produced by distillation.
    pub sections_total: usize,
    /// Sections that survived classification.
    pub sections_kept: usize,
    /// Canonical objects written.
    pub canonical_objects: usize,
    /// Chunks written.
    pub chunks: usize,
    /// Embedding records written.
    pub embeddings: usize,
}

impl IngestionCounts {
    /// Accumulate another run's counts (batch aggregation).
    pub fn absorb(&mut self, other: &Self) {
        self.sections_total += other.sections_total;
        self.sections_kept += other.sections_kept;
        self.canonical_objects += other.canonical_objects;
        self.chunks += other.chunks;
        self.embeddings += other.embeddings;
    }
}
