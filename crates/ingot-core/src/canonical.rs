//! Canonicalization: kept sections become immutable learning objects.
//!
//! Ids are deterministic over `(domain, release_id, source_id,
//! section_id)`, and sections are ordered by section id before
//! assignment, so repeated runs write byte-identical files.

use crate::store::ContentStore;
use crate::types::{AlignmentTags, CanonicalObject, DistilledSection, Provenance};
use crate::util::{derived_id, truncate_chars};
use crate::Result;

/// Maximum derived-title length in characters.
const MAX_TITLE_CHARS: usize = 120;

fn title_for(section: &DistilledSection) -> String {
    if let Some(title) = section.title.as_deref() {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    section
        .clean_text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map_or_else(
            || "Untitled".to_string(),
            |line| truncate_chars(line, MAX_TITLE_CHARS).to_string(),
        )
}

fn body_for(clean_text: &str) -> Vec<String> {
    clean_text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Turn kept sections into canonical objects.
///
/// Sections are sorted by `section_id` ascending before ids are
/// assigned; titles fall back to the first non-empty body line.
#[must_use]
pub fn canonicalize_sections(
    mut sections: Vec<DistilledSection>,
    domain: &str,
    source_id: &str,
    release_id: &str,
) -> Vec<CanonicalObject> {
    sections.sort_by(|a, b| a.section_id.cmp(&b.section_id));
    sections
        .into_iter()
        .map(|section| {
            let id = derived_id(
                "clo_",
                &[domain, release_id, source_id, &section.section_id],
            );
            let title = title_for(&section);
            let body = body_for(&section.clean_text);
            CanonicalObject {
                id,
                domain: domain.to_string(),
                title,
                body,
                concepts: Vec::new(),
                provenance: Provenance {
                    source_id: source_id.to_string(),
                    release_id: release_id.to_string(),
                },
                tags: AlignmentTags::default(),
            }
        })
        .collect()
}

/// Persist canonical objects under their release directory.
///
/// Writes are idempotent: deterministic ids plus deterministic JSON
/// mean re-runs overwrite files with identical bytes.
pub fn persist_canonical_objects(
    store: &ContentStore,
    objects: &[CanonicalObject],
) -> Result<()> {
    for object in objects {
        let path = store.canonical_path(
            &object.domain,
            &object.provenance.release_id,
            &object.id,
        )?;
        store.write_json(&path, object)?;
    }
    Ok(())
}
