//! Release lifecycle: create, list, promote, audit.
//!
//! Each ingest run produces a release; artifacts for it already live
//! under the per-kind stores keyed by `(domain, release_id)`. A domain
//! has at most one *active* release, switched by atomically replacing
//! `active_release.txt`. Promotions append to a per-domain
//! `audit.jsonl`.
//!
//! Storage layout:
//!
//! ```text
//! <releases_root>/<domain>/
//!   active_release.txt
//!   audit.jsonl
//!   releases/<release_id>/release.json
//! ```

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::store::{append_line, read_jsonl_tail, validate_slug, write_atomic};
use crate::types::{AuditEvent, ReleaseRecord};
use crate::{Error, Result};

/// Audit event name recorded on every promotion.
pub const PROMOTION_EVENT: &str = "security_release_promoted";

/// Generate a fresh release id: `<domain>_<UTC yyyymmdd-HHMMSS>_<8hex>`.
#[must_use]
pub fn generate_release_id(domain: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix: u32 = rand::random();
    format!("{domain}_{stamp}_{suffix:08x}")
}

/// Manages release records, the active pointer, and the audit log for
/// every domain under one releases root.
#[derive(Debug, Clone)]
pub struct ReleaseManager {
    root: PathBuf,
}

impl ReleaseManager {
    /// Create a manager over the releases root.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The releases root directory.
    #[must_use]
    pub const fn root(&self) -> &PathBuf {
        &self.root
    }

    fn domain_dir(&self, domain: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        Ok(self.root.join(domain))
    }

    fn release_dir(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        validate_slug("release_id", release_id)?;
        Ok(self.domain_dir(domain)?.join("releases").join(release_id))
    }

    /// Path of one release record.
    pub fn release_json_path(&self, domain: &str, release_id: &str) -> Result<PathBuf> {
        Ok(self.release_dir(domain, release_id)?.join("release.json"))
    }

    fn active_path(&self, domain: &str) -> Result<PathBuf> {
        Ok(self.domain_dir(domain)?.join("active_release.txt"))
    }

    fn audit_path(&self, domain: &str) -> Result<PathBuf> {
        Ok(self.domain_dir(domain)?.join("audit.jsonl"))
    }

    /// Create a release record. Idempotent: calling again with the same
    /// inputs rewrites the same file.
    pub fn create_release(
        &self,
        domain: &str,
        release_id: &str,
        created_by: Option<&str>,
        payload: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ReleaseRecord> {
        let record = ReleaseRecord {
            release_id: release_id.to_string(),
            domain: domain.to_string(),
            created_by: created_by.map(ToString::to_string),
            created_at: Utc::now(),
            extra: payload.unwrap_or_default(),
        };

        let path = self.release_json_path(domain, release_id)?;
        let json = serde_json::to_string_pretty(&record)?;
        write_atomic(&path, &json)?;
        Ok(record)
    }

    /// Read one release record.
    pub fn get_release(&self, domain: &str, release_id: &str) -> Result<ReleaseRecord> {
        let path = self.release_json_path(domain, release_id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "release '{release_id}' not found for domain '{domain}'"
            )));
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// List release ids for a domain, ascending.
    pub fn list_releases(&self, domain: &str) -> Result<Vec<String>> {
        let releases_dir = self.domain_dir(domain)?.join("releases");
        let mut ids = Vec::new();
        if let Ok(entries) = fs::read_dir(&releases_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Read the active release pointer, if set.
    pub fn get_active_release(&self, domain: &str) -> Result<Option<String>> {
        let path = self.active_path(domain)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    /// Mark a release active and append an audit event.
    ///
    /// The pointer write is a single-file atomic replace: readers may
    /// observe old-then-new but never a torn value.
    pub fn promote_release(
        &self,
        domain: &str,
        release_id: &str,
        promoted_by: Option<&str>,
        reason: Option<&str>,
    ) -> Result<AuditEvent> {
        let previous = self.get_active_release(domain)?;

        let release_dir = self.release_dir(domain, release_id)?;
        fs::create_dir_all(&release_dir)?;
        write_atomic(&self.active_path(domain)?, release_id)?;

        let event = AuditEvent {
            timestamp: Utc::now(),
            event: PROMOTION_EVENT.to_string(),
            domain: domain.to_string(),
            release_id: release_id.to_string(),
            previous_release_id: previous,
            actor: promoted_by.map(ToString::to_string),
            reason: reason.map(ToString::to_string),
        };
        append_line(&self.audit_path(domain)?, &serde_json::to_string(&event)?)?;
        info!(
            "Promoted {}/{} (previous: {:?})",
            domain, release_id, event.previous_release_id
        );
        Ok(event)
    }

    /// Latest audit events, newest first.
    pub fn list_audit(&self, domain: &str, limit: usize) -> Result<Vec<AuditEvent>> {
        read_jsonl_tail(&self.audit_path(domain)?, limit)
    }
}
