//! Deterministic HTML-to-plaintext normalization.
//!
//! A pure function with no I/O: strip script/style blocks, drop tags,
//! unescape entities, collapse whitespace, tidy punctuation spacing.
//! Identical bytes in always produce identical text out.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[\s\S]*?</script>").expect("valid regex")
});
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[\s\S]*?</style>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,!?:;])").expect("valid regex"));

/// Normalize raw HTML into clean plain text.
///
/// Sequence: remove `<script>`/`<style>` blocks (case-insensitive),
/// drop all remaining tags, unescape named and numeric entities,
/// collapse whitespace runs to single spaces, remove whitespace
/// immediately before `.,!?:;`, trim.
///
/// Empty input yields `""`.
#[must_use]
pub fn clean_html_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = SCRIPT_RE.replace_all(html, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = html_escape::decode_html_entities(&text);
    let text = WS_RE.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT_RE.replace_all(&text, "$1");
    text.trim().to_string()
}
