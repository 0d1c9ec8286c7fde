//! Deterministic section classification and drop rules.
//!
//! Scores each distilled section as instructional vs boilerplate. The
//! score is additive and stable across runs; sections at or above the
//! keep threshold flow on to canonicalization, the rest are dropped
//! with their scoring reasons attached.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::DistilledSection;

/// Sections scoring at or above this are kept.
const KEEP_THRESHOLD: f64 = 0.5;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9_-]*").expect("valid regex"));

const NON_INSTRUCTIONAL_PHRASES: [&str; 17] = [
    "table of contents",
    "toc",
    "subscribe",
    "sign in",
    "log in",
    "login",
    "cookie policy",
    "privacy policy",
    "terms of service",
    "copyright",
    "all rights reserved",
    "newsletter",
    "advertisement",
    "sponsored",
    "share this",
    "edit this page",
    "last updated",
];

const NON_INSTRUCTIONAL_HINTS: [&str; 11] = [
    "next",
    "previous",
    "page",
    "breadcrumbs",
    "cookie",
    "consent",
    "tracking",
    "analytics",
    "github",
    "twitter",
    "linkedin",
];

const INSTRUCTIONAL_VERBS: [&str; 13] = [
    "run",
    "use",
    "create",
    "configure",
    "deploy",
    "install",
    "set",
    "enable",
    "disable",
    "define",
    "apply",
    "initialize",
    "init",
];

/// Outcome of scoring one section.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Whether the section clears the keep threshold.
    pub is_instructional: bool,
    /// Final additive score.
    pub score: f64,
    /// Which rules fired, in application order.
    pub reasons: Vec<String>,
}

/// Collapse whitespace and lowercase for phrase matching.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Score a single section.
#[must_use]
pub fn classify_section(section: &DistilledSection) -> Classification {
    let kind = section.kind.as_str();
    let title = normalize(section.title.as_deref().unwrap_or(""));
    let text = normalize(&section.clean_text);

    if text.is_empty() {
        return Classification {
            is_instructional: false,
            score: -10.0,
            reasons: vec!["empty_text".to_string()],
        };
    }

    let mut score = 0.0;
    let mut reasons = Vec::new();

    match kind {
        "howto" | "example" | "definition" => {
            score += 3.0;
            reasons.push(format!("kind:{kind}"));
        },
        "note" | "explanation" => {
            score += 1.0;
            reasons.push(format!("kind:{kind}"));
        },
        _ => {},
    }

    for phrase in NON_INSTRUCTIONAL_PHRASES {
        if title.contains(phrase) || text.contains(phrase) {
            score -= 6.0;
            reasons.push(format!("non_instr_phrase:{phrase}"));
        }
    }
    for hint in NON_INSTRUCTIONAL_HINTS {
        if title.contains(hint) || text.contains(hint) {
            score -= 1.0;
            reasons.push(format!("non_instr_hint:{hint}"));
        }
    }
    if title.contains("table of contents") || text.starts_with("table of contents") {
        score -= 8.0;
        reasons.push("toc".to_string());
    }

    let words: Vec<String> = WORD_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let verb_hits = words
        .iter()
        .filter(|w| INSTRUCTIONAL_VERBS.contains(&w.as_str()))
        .count();
    if verb_hits > 0 {
        #[allow(clippy::cast_precision_loss)]
        let bonus = (0.5 * verb_hits as f64).min(2.0);
        score += bonus;
        reasons.push(format!("verb_hits:{verb_hits}"));
    }

    if !words.is_empty() {
        let short = words.iter().filter(|w| w.len() <= 3).count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = short as f64 / words.len().max(1) as f64;
        if ratio > 0.55 && words.len() >= 12 {
            score -= 2.0;
            reasons.push("nav_like_short_word_ratio".to_string());
        }
    }

    if text.chars().count() < 40 {
        score -= 1.5;
        reasons.push("too_short".to_string());
    }

    Classification {
        is_instructional: score >= KEEP_THRESHOLD,
        score,
        reasons,
    }
}

/// Partition sections into kept and dropped (with classifications).
#[must_use]
pub fn filter_instructional(
    sections: Vec<DistilledSection>,
) -> (
    Vec<DistilledSection>,
    Vec<(DistilledSection, Classification)>,
) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for section in sections {
        let classification = classify_section(&section);
        if classification.is_instructional {
            kept.push(section);
        } else {
            dropped.push((section, classification));
        }
    }
    (kept, dropped)
}
