//! Ingest command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ingot_core::{
    CaptureService, Config, ContentStore, IngestionRequest, ObservabilityStore, Pipeline, Signer,
};

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Resolved ingest arguments.
#[derive(Debug)]
pub struct IngestInput {
    /// Tenant domain.
    pub domain: String,
    /// Logical source id.
    pub source_id: String,
    /// Target release.
    pub release_id: String,
    /// Inline HTML, if given.
    pub html: Option<String>,
    /// HTML file, if given.
    pub html_file: Option<PathBuf>,
    /// Capture id, if given.
    pub capture: Option<String>,
    /// Allow quarantined captures.
    pub force: bool,
    /// Release attribution.
    pub created_by: Option<String>,
}

/// Execute the ingest command.
pub async fn execute(config: &Config, input: IngestInput, format: OutputFormat) -> Result<()> {
    let raw_html = resolve_html(config, &input)?;

    let pipeline = Pipeline::from_config(config)?;
    let outcome = pipeline
        .run(&IngestionRequest {
            domain: input.domain.clone(),
            source_id: input.source_id.clone(),
            release_id: input.release_id.clone(),
            raw_html,
            created_by: input.created_by.clone(),
            write_release: true,
        })
        .await?;

    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            println!(
                "Ingested {}/{} into release {}",
                outcome.domain, input.source_id, outcome.release_id
            );
            println!(
                "  sections: {} distilled, {} kept",
                outcome.counts.sections_total, outcome.counts.sections_kept
            );
            println!(
                "  artifacts: {} canonical objects, {} chunks, {} embeddings",
                outcome.counts.canonical_objects,
                outcome.counts.chunks,
                outcome.counts.embeddings
            );
        },
    }
    Ok(())
}

fn resolve_html(config: &Config, input: &IngestInput) -> Result<String> {
    if let Some(html) = &input.html {
        return Ok(html.clone());
    }
    if let Some(path) = &input.html_file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    if let Some(capture_id) = &input.capture {
        let service = CaptureService::new(
            ContentStore::new(config.paths.clone()),
            Signer::new(config.signing_secret.as_deref()),
            ObservabilityStore::new(config.paths.observability_root.clone()),
        )?;
        return Ok(service.raw_payload_for_ingestion(&input.domain, capture_id, input.force)?);
    }
    bail!("one of --html, --html-file, or --capture is required");
}
