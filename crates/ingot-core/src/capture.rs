//! Raw document capture: fetch-or-upload snapshots with integrity
//! signatures and quarantine marking.
//!
//! A capture is the entry point of all content: the raw payload is
//! written next to a JSON metadata record under
//! `<captures_root>/<domain>/<source_id>.{html,json}`. Captures are
//! mutated only by quarantine marking and are never deleted by the
//! core.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::cleaner::clean_html_text;
use crate::integrity::Signer;
use crate::observability::ObservabilityStore;
use crate::store::ContentStore;
use crate::types::Capture;
use crate::util::content_hash;
use crate::{Error, Result};

/// Default fetch timeout for URL captures, in seconds.
pub const DEFAULT_CAPTURE_TIMEOUT_S: u64 = 10;

/// Capture behavior knobs.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Per-request fetch timeout (URL captures only).
    pub timeout_s: u64,
    /// Also store a cleaned-text rendition of the payload.
    pub clean: bool,
    /// Auto-quarantine captures that fail (non-2xx or blank body).
    pub quarantine_suspicious: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            timeout_s: DEFAULT_CAPTURE_TIMEOUT_S,
            clean: false,
            quarantine_suspicious: true,
        }
    }
}

/// Captures raw documents into the content store.
pub struct CaptureService {
    store: ContentStore,
    signer: Signer,
    observability: ObservabilityStore,
    client: reqwest::Client,
}

impl CaptureService {
    /// Create a capture service over the given stores.
    pub fn new(
        store: ContentStore,
        signer: Signer,
        observability: ObservabilityStore,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ingot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            store,
            signer,
            observability,
            client,
        })
    }

    /// Fetch a URL and persist the capture.
    ///
    /// Non-2xx responses still produce a capture record (marked not ok,
    /// and quarantined when `quarantine_suspicious` is set); only
    /// transport failures error out.
    pub async fn capture_url(
        &self,
        domain: &str,
        source_id: &str,
        url: &str,
        options: &CaptureOptions,
    ) -> Result<Capture> {
        if url.trim().is_empty() {
            return Err(Error::Validation("url is required".to_string()));
        }

        let response = match self
            .client
            .get(url)
            .timeout(Duration::from_secs(options.timeout_s))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.record(
                    domain,
                    "ingestion_raw_capture",
                    "error",
                    "ERROR",
                    serde_json::json!({
                        "source_id": source_id,
                        "url": url,
                        "error": err.to_string(),
                    }),
                )?;
                return Err(Error::Network(err));
            },
        };

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        self.persist_capture(
            domain,
            source_id,
            Some(url.to_string()),
            status,
            headers,
            &body,
            options,
        )
    }

    /// Capture a local file as if it had been uploaded.
    pub fn capture_file(
        &self,
        domain: &str,
        source_id: &str,
        path: &Path,
        options: &CaptureOptions,
    ) -> Result<Capture> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "capture input '{}' not found",
                path.display()
            )));
        }
        let body = std::fs::read_to_string(path)?;
        self.persist_capture(domain, source_id, None, 200, BTreeMap::new(), &body, options)
    }

    #[allow(clippy::too_many_arguments)]
    fn persist_capture(
        &self,
        domain: &str,
        source_id: &str,
        url: Option<String>,
        http_status: u16,
        headers: BTreeMap<String, String>,
        body: &str,
        options: &CaptureOptions,
    ) -> Result<Capture> {
        let capture_ok = (200..300).contains(&http_status) && !body.trim().is_empty();
        let quarantined = options.quarantine_suspicious && !capture_ok;

        let payload_path = self.store.capture_payload_path(domain, source_id)?;
        crate::store::write_atomic(&payload_path, body)?;

        let hash = content_hash(body);
        let signature = self.signer.sign(&hash);

        let capture = Capture {
            source_id: source_id.to_string(),
            domain: domain.to_string(),
            url,
            http_status,
            headers,
            raw_payload_path: payload_path.display().to_string(),
            content_hash: hash,
            content_signature: signature,
            retrieved_at: Utc::now(),
            capture_ok,
            cleaned_text: options.clean.then(|| clean_html_text(body)),
            quarantined,
            quarantine_reason: quarantined.then(|| "capture_failed".to_string()),
            quarantined_at: None,
        };
        self.save(&capture)?;

        if quarantined {
            warn!("Quarantined capture {}/{} (status {})", domain, source_id, http_status);
        } else {
            info!("Captured {}/{} ({} bytes)", domain, source_id, body.len());
        }
        let status = if capture_ok { "success" } else { "failed" };
        self.record(
            domain,
            "ingestion_raw_capture",
            status,
            "INFO",
            serde_json::json!({
                "source_id": source_id,
                "http_status": http_status,
                "quarantined": quarantined,
            }),
        )?;
        Ok(capture)
    }

    /// Load a capture record by id.
    pub fn load_capture(&self, domain: &str, capture_id: &str) -> Result<Capture> {
        let path = self.store.capture_meta_path(domain, capture_id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "capture '{capture_id}' not found for domain '{domain}'"
            )));
        }
        self.store.read_json(&path)
    }

    /// Mark a capture quarantined.
    pub fn quarantine(
        &self,
        domain: &str,
        capture_id: &str,
        reason: Option<&str>,
    ) -> Result<Capture> {
        let mut capture = self.load_capture(domain, capture_id)?;
        capture.quarantined = true;
        capture.quarantine_reason =
            Some(reason.unwrap_or("manual_quarantine").to_string());
        capture.quarantined_at = Some(Utc::now());
        self.save(&capture)?;

        self.record(
            domain,
            "ingestion_quarantine",
            "success",
            "INFO",
            serde_json::json!({
                "source_id": capture_id,
                "reason": capture.quarantine_reason,
            }),
        )?;
        Ok(capture)
    }

    /// Read a capture's raw payload for ingestion.
    ///
    /// Unless `force` is set, the capture must be ok and not
    /// quarantined.
    pub fn raw_payload_for_ingestion(
        &self,
        domain: &str,
        capture_id: &str,
        force: bool,
    ) -> Result<String> {
        let capture = self.load_capture(domain, capture_id)?;
        if !force {
            if !capture.capture_ok {
                return Err(Error::Validation(format!(
                    "capture '{capture_id}' is not usable (capture_ok=false)"
                )));
            }
            if capture.quarantined {
                return Err(Error::Validation(format!(
                    "capture '{capture_id}' is quarantined"
                )));
            }
        }
        let path = Path::new(&capture.raw_payload_path);
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "raw payload for capture '{capture_id}' not found"
            )));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn save(&self, capture: &Capture) -> Result<()> {
        let path = self
            .store
            .capture_meta_path(&capture.domain, &capture.source_id)?;
        self.store.write_json(&path, capture)
    }

    fn record(
        &self,
        domain: &str,
        event: &str,
        status: &str,
        level: &str,
        fields: serde_json::Value,
    ) -> Result<()> {
        let fields = match fields {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.observability
            .record_event(domain, event, status, level, fields)?;
        Ok(())
    }
}
