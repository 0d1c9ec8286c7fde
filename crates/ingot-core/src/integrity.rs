//! Keyed integrity signatures for capture content hashes.
//!
//! The signing scheme is HMAC-SHA256 over the content-hash *string*
//! (e.g. `sha256:<hex>`), rendered as `hmac-sha256:<hex>`. This is a
//! lightweight integrity check, not a substitute for a real KMS-backed
//! signing pipeline.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Insecure fallback used when no secret is configured. Local runs keep
/// working; production deployments must set `INGESTION_SIGNING_SECRET`.
const DEV_FALLBACK_SECRET: &str = "dev-ingestion-signing-secret-CHANGE-IN-PRODUCTION";

/// Signs and verifies content hashes with a fixed secret.
#[derive(Debug, Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    /// Build a signer from a configured secret. A missing secret logs a
    /// warning and falls back to the insecure dev default.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        let secret = match secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                warn!(
                    "INGESTION_SIGNING_SECRET not set; using insecure dev default. \
                     Set INGESTION_SIGNING_SECRET in production."
                );
                DEV_FALLBACK_SECRET.to_string()
            },
        };
        Self { secret }
    }

    /// Return `hmac-sha256:<hex>` over `content_hash`.
    #[must_use]
    pub fn sign(&self, content_hash: &str) -> String {
        use std::fmt::Write;

        let mut mac = new_mac(&self.secret);
        mac.update(content_hash.as_bytes());
        let digest = mac.finalize().into_bytes();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        format!("hmac-sha256:{hex}")
    }

    /// Verify a signature in constant time.
    #[must_use]
    pub fn verify(&self, content_hash: &str, signature: &str) -> bool {
        let Some(hex) = signature.strip_prefix("hmac-sha256:") else {
            return false;
        };
        let Some(raw) = decode_hex(hex) else {
            return false;
        };
        let mut mac = new_mac(&self.secret);
        mac.update(content_hash.as_bytes());
        mac.verify_slice(&raw).is_ok()
    }
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    #[allow(clippy::expect_used)]
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length")
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let signer = Signer::new(Some("secret"));
        let hash = "sha256:deadbeef";
        let signature = signer.sign(hash);
        assert!(signature.starts_with("hmac-sha256:"));
        assert_eq!(signature.len(), "hmac-sha256:".len() + 64);
        assert!(signer.verify(hash, &signature));
    }

    #[test]
    fn verify_rejects_other_hashes_and_garbage() {
        let signer = Signer::new(Some("secret"));
        let signature = signer.sign("sha256:aaaa");
        assert!(!signer.verify("sha256:bbbb", &signature));
        assert!(!signer.verify("sha256:aaaa", "hmac-sha256:zzzz"));
        assert!(!signer.verify("sha256:aaaa", "not-a-signature"));
        assert!(!signer.verify("sha256:aaaa", ""));
    }

    #[test]
    fn verify_rejects_signatures_from_other_secrets() {
        let a = Signer::new(Some("secret-a"));
        let b = Signer::new(Some("secret-b"));
        let signature = a.sign("sha256:cafe");
        assert!(!b.verify("sha256:cafe", &signature));
    }

    #[test]
    fn missing_secret_falls_back_deterministically() {
        let a = Signer::new(None);
        let b = Signer::new(Some("   "));
        let signature = a.sign("sha256:cafe");
        assert!(b.verify("sha256:cafe", &signature));
    }
}
