//! Release management commands: list, promote, audit.

use anyhow::Result;
use ingot_core::{Config, ObservabilityStore, ReleaseManager};

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Execute the releases listing command.
pub fn list_releases(config: &Config, domain: &str, format: OutputFormat) -> Result<()> {
    let manager = ReleaseManager::new(config.paths.releases_root.clone());
    let active = manager.get_active_release(domain)?;
    let releases = manager.list_releases(domain)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "domain": domain,
            "active_release": active,
            "releases": releases,
        }))?,
        OutputFormat::Text => {
            if releases.is_empty() {
                println!("No releases for domain '{domain}'");
                return Ok(());
            }
            println!("Releases for {domain}:");
            for release in &releases {
                let marker = if active.as_deref() == Some(release) {
                    " (active)"
                } else {
                    ""
                };
                println!("  {release}{marker}");
            }
        },
    }
    Ok(())
}

/// Execute the promote command.
pub fn promote(
    config: &Config,
    domain: &str,
    release_id: &str,
    promoted_by: Option<&str>,
    reason: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let manager = ReleaseManager::new(config.paths.releases_root.clone());
    let event = manager.promote_release(domain, release_id, promoted_by, reason)?;

    let observability = ObservabilityStore::new(config.paths.observability_root.clone());
    let mut fields = serde_json::Map::new();
    fields.insert("release_id".to_string(), serde_json::json!(release_id));
    fields.insert(
        "previous_release_id".to_string(),
        serde_json::json!(event.previous_release_id),
    );
    observability.record_event(domain, "release_promoted", "success", "INFO", fields)?;

    match format {
        OutputFormat::Json => print_json(&event)?,
        OutputFormat::Text => {
            println!("Promoted {domain}/{release_id}");
            if let Some(previous) = &event.previous_release_id {
                println!("  previous active: {previous}");
            }
        },
    }
    Ok(())
}

/// Execute the audit command.
pub fn audit(config: &Config, domain: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let manager = ReleaseManager::new(config.paths.releases_root.clone());
    let events = manager.list_audit(domain, limit)?;

    match format {
        OutputFormat::Json => print_json(&events)?,
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No audit events for domain '{domain}'");
                return Ok(());
            }
            for event in &events {
                println!(
                    "{}  {}  {} (previous: {})",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.release_id,
                    event.actor.as_deref().unwrap_or("-"),
                    event.previous_release_id.as_deref().unwrap_or("none"),
                );
            }
        },
    }
    Ok(())
}
