//! Batch command implementation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ingot_core::{
    run_batch, BatchInput, BatchItem, BatchOptions, BatchStatus, CaptureService, Config,
    ContentStore, ObservabilityStore, Pipeline, Signer,
};
use serde::Deserialize;

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// One manifest entry; exactly one input field must be set.
#[derive(Debug, Deserialize)]
struct ManifestItem {
    source_id: String,
    #[serde(default)]
    raw_html: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    capture_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Execute the batch command.
pub async fn execute(
    config: &Config,
    domain: &str,
    manifest: &Path,
    options: BatchOptions,
    format: OutputFormat,
) -> Result<()> {
    let raw = std::fs::read_to_string(manifest)
        .with_context(|| format!("failed to read {}", manifest.display()))?;
    let entries: Vec<ManifestItem> =
        serde_json::from_str(&raw).context("manifest must be a JSON array of items")?;

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let input = match (entry.raw_html, entry.path, entry.capture_id, entry.url) {
            (Some(html), None, None, None) => BatchInput::RawHtml(html),
            (None, Some(path), None, None) => BatchInput::FilePath(path),
            (None, None, Some(capture_id), None) => BatchInput::CaptureId(capture_id),
            (None, None, None, Some(url)) => BatchInput::Url(url),
            _ => bail!(
                "manifest item '{}' must set exactly one of raw_html, path, capture_id, url",
                entry.source_id
            ),
        };
        items.push(BatchItem {
            source_id: entry.source_id,
            input,
        });
    }

    let pipeline = Pipeline::from_config(config)?;
    let captures = CaptureService::new(
        ContentStore::new(config.paths.clone()),
        Signer::new(config.signing_secret.as_deref()),
        ObservabilityStore::new(config.paths.observability_root.clone()),
    )?;

    let report = run_batch(&pipeline, &captures, domain, &items, &options).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!(
                "Batch {} into release {}: {:?}",
                report.domain, report.release_id, report.status
            );
            for item in &report.items {
                match (&item.counts, &item.error) {
                    (Some(counts), _) => println!(
                        "  {} ok ({} chunks)",
                        item.source_id, counts.chunks
                    ),
                    (None, Some(error)) => println!("  {} FAILED: {error}", item.source_id),
                    (None, None) => println!("  {} FAILED", item.source_id),
                }
            }
            println!(
                "  totals: {} canonical objects, {} chunks",
                report.totals.canonical_objects, report.totals.chunks
            );
        },
    }

    if report.status == BatchStatus::Failed {
        bail!("batch failed: no item ingested successfully");
    }
    Ok(())
}
