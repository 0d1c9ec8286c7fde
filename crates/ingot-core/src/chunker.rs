//! Deterministic chunking of canonical objects.
//!
//! Body paragraphs are split into units no longer than `max_chars`
//! (sentence-packing long paragraphs, hard-slicing pathological
//! sentences), then units are greedily packed into chunks joined by
//! blank lines. Boundaries depend only on the input text and the
//! size bound, so chunk ids are stable across runs.

use std::sync::LazyLock;

use regex::Regex;

use crate::store::ContentStore;
use crate::types::{CanonicalObject, Chunk};
use crate::util::derived_id;
use crate::Result;

/// Default upper bound on chunk text length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 800;

static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Split on whitespace runs that immediately follow `.`, `!` or `?`.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in WS_RUN_RE.find_iter(text) {
        let preceding = text[..m.start()].chars().next_back();
        if matches!(preceding, Some('.' | '!' | '?')) {
            let sentence = text[last..m.start()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            last = m.end();
        }
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Slice text into windows of at most `max_chars` characters.
fn hard_slice(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|window| window.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Split one paragraph into units not exceeding `max_chars`.
fn split_long_paragraph(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() <= max_chars {
        return vec![trimmed.to_string()];
    }

    let sentences = split_sentences(trimmed);
    if sentences.len() <= 1 {
        return hard_slice(trimmed, max_chars);
    }

    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for sentence in sentences {
        let sentence_len = sentence.chars().count();
        if current.is_empty() {
            current = sentence;
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len > max_chars {
            parts.push(current);
            current = sentence;
            current_len = sentence_len;
        } else {
            current.push(' ');
            current.push_str(&sentence);
            current_len += 1 + sentence_len;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    // A single sentence can still exceed the bound.
    parts
        .into_iter()
        .flat_map(|part| {
            if part.chars().count() <= max_chars {
                vec![part]
            } else {
                hard_slice(&part, max_chars)
            }
        })
        .collect()
}

/// Chunk one canonical object.
#[must_use]
pub fn chunk_canonical_object(
    clo: &CanonicalObject,
    domain: &str,
    release_id: &str,
    max_chars: usize,
) -> Vec<Chunk> {
    let units: Vec<String> = clo
        .body
        .iter()
        .flat_map(|paragraph| split_long_paragraph(paragraph, max_chars))
        .collect();

    let tags = clo.tags.normalized();
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffer_len = 0;
    let mut chunk_index: usize = 0;

    let mut flush = |buffer: &mut Vec<String>, buffer_len: &mut usize, chunk_index: &mut usize| {
        if buffer.is_empty() {
            return;
        }
        let text = buffer.join("\n\n").trim().to_string();
        buffer.clear();
        *buffer_len = 0;
        if text.is_empty() {
            return;
        }
        let chunk_id = derived_id(
            "chk_",
            &[domain, release_id, &clo.id, &chunk_index.to_string(), &text],
        );
        chunks.push(Chunk {
            chunk_id,
            domain: domain.to_string(),
            release_id: release_id.to_string(),
            text,
            tags: tags.clone(),
            embedding_ref: None,
        });
        *chunk_index += 1;
    };

    for unit in units {
        let unit_len = unit.chars().count();
        if unit_len == 0 {
            continue;
        }
        if !buffer.is_empty() && buffer_len + 2 + unit_len > max_chars {
            flush(&mut buffer, &mut buffer_len, &mut chunk_index);
        }
        if buffer.is_empty() {
            buffer_len = unit_len;
        } else {
            buffer_len += 2 + unit_len;
        }
        buffer.push(unit);
    }
    flush(&mut buffer, &mut buffer_len, &mut chunk_index);

    chunks
}

/// Chunk a set of canonical objects in deterministic (id) order.
#[must_use]
pub fn chunk_canonical_objects(
    clos: &[CanonicalObject],
    domain: &str,
    release_id: &str,
    max_chars: usize,
) -> Vec<Chunk> {
    let mut ordered: Vec<&CanonicalObject> = clos.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    ordered
        .into_iter()
        .flat_map(|clo| chunk_canonical_object(clo, domain, release_id, max_chars))
        .collect()
}

/// Persist chunk records under their release directory.
pub fn persist_chunks(store: &ContentStore, chunks: &[Chunk]) -> Result<()> {
    for chunk in chunks {
        let path = store.chunk_path(&chunk.domain, &chunk.release_id, &chunk.chunk_id)?;
        store.write_json(&path, chunk)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{AlignmentTags, Provenance};
    use proptest::prelude::*;

    fn clo(id: &str, body: Vec<&str>) -> CanonicalObject {
        CanonicalObject {
            id: id.to_string(),
            domain: "tf".to_string(),
            title: "T".to_string(),
            body: body.into_iter().map(ToString::to_string).collect(),
            concepts: Vec::new(),
            provenance: Provenance {
                source_id: "s1".to_string(),
                release_id: "r1".to_string(),
            },
            tags: AlignmentTags::default(),
        }
    }

    #[test]
    fn short_paragraphs_pack_into_one_chunk() {
        let chunks = chunk_canonical_object(&clo("clo_a", vec!["alpha", "beta"]), "tf", "r1", 800);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha\n\nbeta");
    }

    #[test]
    fn paragraphs_split_when_bound_exceeded() {
        let chunks = chunk_canonical_object(
            &clo("clo_a", vec!["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc"]),
            "tf",
            "r1",
            25,
        );
        // 10 + 2 + 10 = 22 fits; adding the third (36) does not.
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaaaaaaaa\n\nbbbbbbbbbb");
        assert_eq!(chunks[1].text, "cccccccccc");
    }

    #[test]
    fn long_paragraph_sentence_packs() {
        let paragraph = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunk_canonical_object(&clo("clo_a", vec![paragraph]), "tf", "r1", 45);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].text, "First sentence here. Second sentence here.");
        assert_eq!(chunks[1].text, "Third sentence here.");
    }

    #[test]
    fn sentence_longer_than_bound_is_hard_sliced() {
        let long_word = "x".repeat(50);
        let chunks = chunk_canonical_object(&clo("clo_a", vec![&long_word]), "tf", "r1", 20);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 20);
        }
    }

    #[test]
    fn chunk_ids_are_deterministic_and_well_formed() {
        let object = clo("clo_a", vec!["some body text"]);
        let a = chunk_canonical_object(&object, "tf", "r1", 800);
        let b = chunk_canonical_object(&object, "tf", "r1", 800);
        assert_eq!(a[0].chunk_id, b[0].chunk_id);
        assert!(a[0].chunk_id.starts_with("chk_"));
        assert_eq!(a[0].chunk_id.len(), 28);
    }

    #[test]
    fn objects_chunk_in_id_order() {
        let clos = vec![clo("clo_b", vec!["second"]), clo("clo_a", vec!["first"])];
        let chunks = chunk_canonical_objects(&clos, "tf", "r1", 800);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[1].text, "second");
    }

    #[test]
    fn tags_propagate_normalized() {
        let mut object = clo("clo_a", vec!["body"]);
        object.tags.concept_id = Some("  c1  ".to_string());
        object.tags.level = Some("   ".to_string());
        let chunks = chunk_canonical_object(&object, "tf", "r1", 800);
        assert_eq!(chunks[0].tags.concept_id.as_deref(), Some("c1"));
        assert!(chunks[0].tags.level.is_none());
    }

    #[test]
    fn empty_body_produces_no_chunks() {
        assert!(chunk_canonical_object(&clo("clo_a", vec![]), "tf", "r1", 800).is_empty());
        assert!(chunk_canonical_object(&clo("clo_a", vec!["  "]), "tf", "r1", 800).is_empty());
    }

    proptest! {
        #[test]
        fn every_chunk_respects_the_bound(
            body in proptest::collection::vec("[ -~]{0,200}", 0..8),
            max_chars in 10usize..200,
        ) {
            let body_refs: Vec<&str> = body.iter().map(String::as_str).collect();
            let chunks = chunk_canonical_object(&clo("clo_p", body_refs), "tf", "r1", max_chars);
            for chunk in chunks {
                prop_assert!(chunk.text.chars().count() <= max_chars);
                prop_assert!(!chunk.text.is_empty());
                prop_assert!(chunk.chunk_id.starts_with("chk_"));
            }
        }
    }
}
