//! Hashing and id-derivation helpers shared across pipeline stages.

use sha2::{Digest, Sha256};

/// Length of the hex digest slice used in derived artifact ids.
pub const SHORT_ID_HEX_LEN: usize = 24;

/// Full lowercase hex SHA-256 of a string.
#[must_use]
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

/// `sha256:<hex>` content-hash string over raw payload text.
#[must_use]
pub fn content_hash(text: &str) -> String {
    format!("sha256:{}", sha256_hex(text))
}

/// Derive a prefixed short id from `|`-joined parts.
///
/// All stable artifact ids (`sec_`, `clo_`, `chk_`) use this scheme:
/// the prefix plus the first 24 hex chars of the SHA-256 of the joined
/// input.
#[must_use]
pub fn derived_id(prefix: &str, parts: &[&str]) -> String {
    let joined = parts.join("|");
    format!("{prefix}{}", &sha256_hex(&joined)[..SHORT_ID_HEX_LEN])
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Truncate a string to at most `max_chars` characters on a char
/// boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
