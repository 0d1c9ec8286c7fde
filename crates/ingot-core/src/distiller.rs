//! Deterministic HTML distillation into section candidates.
//!
//! Intentionally heuristic and dependency-light: a regex scan over the
//! raw bytes rather than a general HTML parser, chosen so that evidence
//! offsets into the original input survive every transformation.
//!
//! Container elements (`nav`, `footer`, `header`, `aside`) are masked
//! out in place — their bytes are blanked but never removed — so block
//! matches elsewhere keep their absolute offsets.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::cleaner::clean_html_text;
use crate::types::{DistilledSection, Evidence, SectionKind};
use crate::util::derived_id;

const CONTAINER_TAGS: [&str; 4] = ["nav", "footer", "header", "aside"];

const BLOCK_TAGS: [&str; 11] = [
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "li",
    "pre",
    "code",
    "blockquote",
];

static CONTAINER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CONTAINER_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<\s*{tag}[^>]*>[\s\S]*?<\s*/\s*{tag}\s*>"))
                .expect("valid regex")
        })
        .collect()
});

static BLOCK_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BLOCK_TAGS
        .iter()
        .map(|tag| {
            let re = Regex::new(&format!(r"(?is)<\s*{tag}\b[^>]*>([\s\S]*?)<\s*/\s*{tag}\s*>"))
                .expect("valid regex");
            (*tag, re)
        })
        .collect()
});

/// One matched block element with its cleaned inner text and the byte
/// range it occupies in the raw input.
#[derive(Debug, Clone)]
struct Block {
    tag: &'static str,
    start: usize,
    end: usize,
    text: String,
}

impl Block {
    const fn is_heading(&self) -> bool {
        self.tag.len() == 2 && self.tag.as_bytes()[0] == b'h'
    }
}

/// Find byte ranges covered by container elements, merged where they
/// overlap.
fn container_ranges(raw_html: &str) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for re in CONTAINER_RES.iter() {
        for m in re.find_iter(raw_html) {
            ranges.push((m.start(), m.end()));
        }
    }
    if ranges.is_empty() {
        return ranges;
    }
    ranges.sort_unstable();
    let mut merged = vec![ranges[0]];
    for (start, end) in ranges.into_iter().skip(1) {
        // Last element exists by construction.
        let last = merged.len() - 1;
        if start <= merged[last].1 {
            merged[last].1 = merged[last].1.max(end);
        } else {
            merged.push((start, end));
        }
    }
    merged
}

/// Blank out masked ranges while preserving byte offsets: every
/// non-newline character inside a range becomes as many spaces as its
/// UTF-8 width. Newlines survive so line structure stays intact.
fn mask_ranges(raw_html: &str, ranges: &[(usize, usize)]) -> String {
    if ranges.is_empty() {
        return raw_html.to_string();
    }
    let mut masked = String::with_capacity(raw_html.len());
    let mut range_idx = 0;
    for (offset, ch) in raw_html.char_indices() {
        while range_idx < ranges.len() && offset >= ranges[range_idx].1 {
            range_idx += 1;
        }
        let in_range =
            range_idx < ranges.len() && offset >= ranges[range_idx].0 && offset < ranges[range_idx].1;
        if in_range && ch != '\n' {
            for _ in 0..ch.len_utf8() {
                masked.push(' ');
            }
        } else {
            masked.push(ch);
        }
    }
    masked
}

fn is_boilerplate(clean_text: &str) -> bool {
    let normalized = clean_text.trim().to_lowercase();
    if normalized.is_empty() || normalized.chars().count() < 3 {
        return true;
    }
    matches!(
        normalized.as_str(),
        "home" | "docs" | "edit this page" | "last updated"
    )
}

/// Extract block elements from masked HTML in document order.
///
/// Blocks are matched per tag and merged into a single left-to-right
/// sweep: a match starting inside an earlier accepted match is
/// discarded, so nested elements do not produce duplicate blocks.
fn extract_blocks(raw_html: &str) -> Vec<Block> {
    if raw_html.is_empty() {
        return Vec::new();
    }
    let masked = mask_ranges(raw_html, &container_ranges(raw_html));

    let mut matches: Vec<Block> = Vec::new();
    for (tag, re) in BLOCK_RES.iter() {
        for caps in re.captures_iter(&masked) {
            // Capture 0 always exists; capture 1 is the inner text.
            let Some(whole) = caps.get(0) else { continue };
            let inner = caps.get(1).map_or("", |m| m.as_str());
            matches.push(Block {
                tag: *tag,
                start: whole.start(),
                end: whole.end(),
                text: inner.to_string(),
            });
        }
    }
    matches.sort_by_key(|b| b.start);

    let mut blocks: Vec<Block> = Vec::new();
    let mut scan_end = 0;
    let mut seen: HashSet<String> = HashSet::new();
    for mut block in matches {
        if block.start < scan_end {
            continue;
        }
        scan_end = block.end;
        block.text = clean_html_text(&block.text);
        if is_boilerplate(&block.text) {
            continue;
        }
        if !seen.insert(block.text.clone()) {
            continue;
        }
        blocks.push(block);
    }
    blocks
}

/// Assign a section kind from title/text heuristics.
fn guess_kind(title: Option<&str>, text: &str) -> SectionKind {
    let title = title.unwrap_or("").trim().to_lowercase();
    if title.contains("example") {
        return SectionKind::Example;
    }
    if title.starts_with("how to") || title.contains("how-to") || title.contains("howto") {
        return SectionKind::Howto;
    }
    if title.starts_with("note") || title.starts_with("warning") || title.starts_with("caution") {
        return SectionKind::Note;
    }
    if title.contains("definition") {
        return SectionKind::Definition;
    }
    if text.trim().to_lowercase().starts_with("example:") {
        return SectionKind::Example;
    }
    SectionKind::Explanation
}

fn make_section(
    domain: &str,
    source_hash: &str,
    title: Option<String>,
    clean_text: String,
    evidence: Vec<Evidence>,
) -> DistilledSection {
    let kind = guess_kind(title.as_deref(), &clean_text);
    let section_id = derived_id(
        "sec_",
        &[
            domain,
            source_hash,
            kind.as_str(),
            title.as_deref().unwrap_or(""),
            &clean_text,
        ],
    );
    DistilledSection {
        section_id,
        domain: domain.to_string(),
        kind,
        title,
        clean_text,
        evidence,
    }
}

/// Distill raw HTML into an ordered list of section candidates.
///
/// A heading block closes the current section and opens a new one with
/// the heading text as title; every other block appends its text and an
/// evidence offset to the current section. Inputs with blocks but no
/// headings produce a single untitled section.
///
/// Deterministic: identical bytes in, identical sections out.
#[must_use]
pub fn distill_sections(raw_html: &str, domain: &str, source_hash: &str) -> Vec<DistilledSection> {
    let blocks = extract_blocks(raw_html);

    let mut sections: Vec<DistilledSection> = Vec::new();
    let mut title: Option<String> = None;
    let mut parts: Vec<String> = Vec::new();
    let mut evidence: Vec<Evidence> = Vec::new();

    let flush = |title: &mut Option<String>,
                 parts: &mut Vec<String>,
                 evidence: &mut Vec<Evidence>,
                 sections: &mut Vec<DistilledSection>| {
        if !parts.is_empty() {
            let clean_text = parts.join("\n\n").trim().to_string();
            if !clean_text.is_empty() {
                sections.push(make_section(
                    domain,
                    source_hash,
                    title.clone(),
                    clean_text,
                    std::mem::take(evidence),
                ));
            }
        }
        *title = None;
        parts.clear();
        evidence.clear();
    };

    for block in &blocks {
        if block.is_heading() {
            flush(&mut title, &mut parts, &mut evidence, &mut sections);
            title = Some(block.text.clone());
            evidence.push(Evidence {
                source_hash: source_hash.to_string(),
                offset: [block.start, block.end],
            });
            continue;
        }
        parts.push(block.text.clone());
        evidence.push(Evidence {
            source_hash: source_hash.to_string(),
            offset: [block.start, block.end],
        });
    }
    flush(&mut title, &mut parts, &mut evidence, &mut sections);

    if sections.is_empty() && !blocks.is_empty() {
        let clean_text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string();
        let all_evidence = blocks
            .iter()
            .map(|b| Evidence {
                source_hash: source_hash.to_string(),
                offset: [b.start, b.end],
            })
            .collect();
        sections.push(make_section(
            domain,
            source_hash,
            None,
            clean_text,
            all_evidence,
        ));
    }

    sections
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::util::sha256_hex;

    fn distill(html: &str) -> Vec<DistilledSection> {
        distill_sections(html, "tf", &sha256_hex(html))
    }

    #[test]
    fn nav_content_is_excluded_and_offsets_preserved() {
        let html = "<nav>Home links</nav><h1>Install</h1><p>Run the init command now.</p>";
        let sections = distill(html);
        assert_eq!(sections.len(), 1);

        let section = &sections[0];
        assert_eq!(section.title.as_deref(), Some("Install"));
        assert_eq!(section.clean_text, "Run the init command now.");
        assert!(!section.clean_text.contains("Home"));

        // Evidence offsets index into the original string.
        let h1_start = html.find("<h1>").unwrap();
        let h1_end = html.find("</h1>").unwrap() + "</h1>".len();
        assert_eq!(section.evidence[0].offset, [h1_start, h1_end]);
        let p_start = html.find("<p>").unwrap();
        assert_eq!(section.evidence[1].offset[0], p_start);
        assert_eq!(section.evidence[1].offset[1], html.len());
    }

    #[test]
    fn heading_opens_new_section() {
        let html = "<h1>First</h1><p>Alpha paragraph content.</p>\
                    <h2>Second</h2><p>Beta paragraph content.</p>";
        let sections = distill(html);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title.as_deref(), Some("First"));
        assert_eq!(sections[0].clean_text, "Alpha paragraph content.");
        assert_eq!(sections[1].title.as_deref(), Some("Second"));
        assert_eq!(sections[1].clean_text, "Beta paragraph content.");
    }

    #[test]
    fn no_heading_yields_single_untitled_section() {
        let html = "<p>First paragraph here.</p><p>Second paragraph here.</p>";
        let sections = distill(html);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].title.is_none());
        assert_eq!(
            sections[0].clean_text,
            "First paragraph here.\n\nSecond paragraph here."
        );
        assert_eq!(sections[0].evidence.len(), 2);
    }

    #[test]
    fn boilerplate_blocks_are_dropped() {
        let html = "<p>Home</p><p>docs</p><p>Edit this page</p><p>ok</p>\
                    <p>Real content paragraph.</p>";
        let sections = distill(html);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].clean_text, "Real content paragraph.");
    }

    #[test]
    fn duplicate_blocks_keep_first_occurrence() {
        let html = "<p>Repeated paragraph.</p><p>Repeated paragraph.</p><p>Unique one.</p>";
        let sections = distill(html);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].clean_text, "Repeated paragraph.\n\nUnique one.");
    }

    #[test]
    fn nested_blocks_do_not_duplicate_content() {
        let html = "<blockquote><p>Quoted wisdom here.</p></blockquote>";
        let sections = distill(html);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].clean_text, "Quoted wisdom here.");
        assert_eq!(sections[0].evidence.len(), 1);
    }

    #[test]
    fn kind_heuristics() {
        let cases = [
            ("<h2>Example usage</h2><p>Body text here.</p>", SectionKind::Example),
            ("<h2>How to deploy</h2><p>Body text here.</p>", SectionKind::Howto),
            ("<h2>Warning</h2><p>Body text here.</p>", SectionKind::Note),
            ("<h2>Definition of terms</h2><p>Body text here.</p>", SectionKind::Definition),
            ("<h2>Overview</h2><p>Example: run this.</p>", SectionKind::Example),
            ("<h2>Overview</h2><p>Body text here.</p>", SectionKind::Explanation),
        ];
        for (html, expected) in cases {
            let sections = distill(html);
            assert_eq!(sections[0].kind, expected, "html: {html}");
        }
    }

    #[test]
    fn section_ids_are_stable_and_well_formed() {
        let html = "<h1>Install</h1><p>Run the init command now.</p>";
        let a = distill(html);
        let b = distill(html);
        assert_eq!(a[0].section_id, b[0].section_id);
        assert!(a[0].section_id.starts_with("sec_"));
        assert_eq!(a[0].section_id.len(), 28);
        assert!(a[0].section_id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn containers_with_attributes_are_masked() {
        let html = r#"<nav class="main" id="top">Skip me</nav><p>Keep this paragraph.</p>"#;
        let sections = distill(html);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].clean_text, "Keep this paragraph.");
    }

    #[test]
    fn empty_input_yields_no_sections() {
        assert!(distill("").is_empty());
        assert!(distill("plain text without blocks").is_empty());
    }
}
