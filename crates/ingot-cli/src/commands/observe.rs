//! Observability commands: events and metrics.

use anyhow::Result;
use ingot_core::{Config, ObservabilityStore};

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Execute the events command.
pub fn events(config: &Config, domain: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let store = ObservabilityStore::new(config.paths.observability_root.clone());
    let events = store.list_events(domain, limit)?;

    match format {
        OutputFormat::Json => print_json(&events)?,
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events for domain '{domain}'");
                return Ok(());
            }
            for event in &events {
                println!(
                    "{}  {:7}  {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.status,
                    event.event,
                );
            }
        },
    }
    Ok(())
}

/// Execute the metrics command.
pub fn metrics(config: &Config, domain: &str, hours: u64, format: OutputFormat) -> Result<()> {
    let store = ObservabilityStore::new(config.paths.observability_root.clone());
    let summary = store.summarize(domain, hours)?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!(
                "{} events for {} in the last {}h",
                summary.event_count, summary.domain, summary.window_hours
            );
            for (event, count) in &summary.counts_by_event {
                println!("  {event}: {count}");
            }
            if !summary.counts_by_status.is_empty() {
                println!("By status:");
                for (status, count) in &summary.counts_by_status {
                    println!("  {status}: {count}");
                }
            }
            for alert in &summary.alerts {
                println!(
                    "ALERT [{}] {}: {} event(s)",
                    alert.severity, alert.alert_type, alert.count
                );
            }
        },
    }
    Ok(())
}
