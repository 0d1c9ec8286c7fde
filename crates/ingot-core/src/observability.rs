//! Monitoring and audit for ingestion, retrieval, and release
//! operations.
//!
//! An append-only JSONL event log per domain, cheap counters, and
//! on-demand summaries. Deliberately light: no metrics pipeline, just
//! files an operator (or test) can read back.
//!
//! Counter updates are read-modify-write and may lose increments under
//! concurrent writers; counters are informational, never a correctness
//! signal.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{append_line, read_jsonl_tail, validate_slug, write_atomic};
use crate::Result;

/// Upper bound on events scanned per summary window.
const SUMMARY_SCAN_LIMIT: usize = 10_000;

/// One recorded operational event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Tenant namespace.
    pub domain: String,
    /// Event name, e.g. `ingestion_run`.
    pub event: String,
    /// Outcome: `success`, `failed`, `error`, ...
    pub status: String,
    /// Log level tag.
    pub level: String,
    /// Free-form context fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// An alert derived from the recent event window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// Alert kind: `integrity_failure` or `quarantine`.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Matching event count in the window.
    pub count: usize,
    /// `high` or `medium`.
    pub severity: String,
}

/// Aggregated view over a recent window of events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Tenant namespace.
    pub domain: String,
    /// Window size in hours.
    pub window_hours: u64,
    /// Events inside the window.
    pub event_count: usize,
    /// Counts keyed by event name.
    pub counts_by_event: BTreeMap<String, usize>,
    /// Counts keyed by status.
    pub counts_by_status: BTreeMap<String, usize>,
    /// Derived alerts.
    pub alerts: Vec<Alert>,
}

/// Append-only per-domain event log plus counters.
#[derive(Debug, Clone)]
pub struct ObservabilityStore {
    root: PathBuf,
}

impl ObservabilityStore {
    /// Create a store over the observability root.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn events_path(&self, domain: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        Ok(self.root.join(domain).join("events.jsonl"))
    }

    fn counters_path(&self, domain: &str) -> Result<PathBuf> {
        validate_slug("domain", domain)?;
        Ok(self.root.join(domain).join("counters.json"))
    }

    /// Append one event and bump its counters.
    pub fn record_event(
        &self,
        domain: &str,
        event: &str,
        status: &str,
        level: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ObservabilityEvent> {
        let payload = ObservabilityEvent {
            timestamp: Utc::now(),
            domain: domain.to_string(),
            event: event.to_string(),
            status: status.to_string(),
            level: level.to_string(),
            fields,
        };
        append_line(&self.events_path(domain)?, &serde_json::to_string(&payload)?)?;

        self.increment(domain, &format!("event:{event}"), 1)?;
        self.increment(domain, &format!("status:{status}"), 1)?;
        self.increment(domain, &format!("event_status:{event}:{status}"), 1)?;

        Ok(payload)
    }

    /// Bump one counter. Keys are written sorted so counter files are
    /// diff-friendly.
    pub fn increment(&self, domain: &str, key: &str, amount: u64) -> Result<()> {
        let path = self.counters_path(domain)?;
        let mut counters: BTreeMap<String, u64> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        *counters.entry(key.to_string()).or_insert(0) += amount;
        write_atomic(&path, &serde_json::to_string_pretty(&counters)?)?;
        Ok(())
    }

    /// Read current counters.
    pub fn counters(&self, domain: &str) -> Result<BTreeMap<String, u64>> {
        let path = self.counters_path(domain)?;
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    /// Latest events, newest first; malformed lines skipped.
    pub fn list_events(&self, domain: &str, limit: usize) -> Result<Vec<ObservabilityEvent>> {
        read_jsonl_tail(&self.events_path(domain)?, limit)
    }

    /// Summarize the last `hours` hours of events.
    pub fn summarize(&self, domain: &str, hours: u64) -> Result<Summary> {
        let now = Utc::now();
        // Clamp so pathological window sizes cannot overflow chrono.
        let window_hours = i64::try_from(hours.min(1_000_000)).unwrap_or(1_000_000);
        let since = if hours > 0 {
            now - Duration::hours(window_hours)
        } else {
            now
        };

        let events = self.list_events(domain, SUMMARY_SCAN_LIMIT)?;
        let window: Vec<&ObservabilityEvent> =
            events.iter().filter(|e| e.timestamp >= since).collect();

        let mut counts_by_event: BTreeMap<String, usize> = BTreeMap::new();
        let mut counts_by_status: BTreeMap<String, usize> = BTreeMap::new();
        for event in &window {
            *counts_by_event.entry(event.event.clone()).or_insert(0) += 1;
            *counts_by_status.entry(event.status.clone()).or_insert(0) += 1;
        }

        let mut alerts = Vec::new();
        let integrity_failures = counts_by_event
            .get("ingestion_integrity_failure")
            .copied()
            .unwrap_or(0);
        if integrity_failures > 0 {
            alerts.push(Alert {
                alert_type: "integrity_failure".to_string(),
                count: integrity_failures,
                severity: "high".to_string(),
            });
        }
        let quarantined = counts_by_event
            .get("ingestion_quarantine")
            .copied()
            .unwrap_or(0);
        if quarantined > 0 {
            alerts.push(Alert {
                alert_type: "quarantine".to_string(),
                count: quarantined,
                severity: "medium".to_string(),
            });
        }

        Ok(Summary {
            domain: domain.to_string(),
            window_hours: hours,
            event_count: window.len(),
            counts_by_event,
            counts_by_status,
            alerts,
        })
    }
}
