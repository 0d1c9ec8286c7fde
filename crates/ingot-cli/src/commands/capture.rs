//! Capture and quarantine command implementations.

use std::path::Path;

use anyhow::{bail, Result};
use ingot_core::{
    Capture, CaptureOptions, CaptureService, Config, ContentStore, ObservabilityStore, Signer,
};

use crate::cli::OutputFormat;
use crate::commands::print_json;

fn service(config: &Config) -> Result<CaptureService> {
    Ok(CaptureService::new(
        ContentStore::new(config.paths.clone()),
        Signer::new(config.signing_secret.as_deref()),
        ObservabilityStore::new(config.paths.observability_root.clone()),
    )?)
}

/// Execute the capture command.
pub async fn execute(
    config: &Config,
    domain: &str,
    source_id: &str,
    url: Option<&str>,
    file: Option<&Path>,
    options: CaptureOptions,
    format: OutputFormat,
) -> Result<()> {
    let service = service(config)?;
    let capture = match (url, file) {
        (Some(url), None) => service.capture_url(domain, source_id, url, &options).await?,
        (None, Some(path)) => service.capture_file(domain, source_id, path, &options)?,
        _ => bail!("exactly one of --url or --file is required"),
    };
    report(&capture, format)
}

/// Execute the quarantine command.
pub fn quarantine(
    config: &Config,
    domain: &str,
    capture_id: &str,
    reason: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let service = service(config)?;
    let capture = service.quarantine(domain, capture_id, reason)?;
    report(&capture, format)
}

fn report(capture: &Capture, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(capture)?,
        OutputFormat::Text => {
            let state = if capture.quarantined {
                "QUARANTINED"
            } else if capture.capture_ok {
                "ok"
            } else {
                "failed"
            };
            println!(
                "Capture {}/{}: {} (http {})",
                capture.domain, capture.source_id, state, capture.http_status
            );
            println!("  hash: {}", capture.content_hash);
            println!("  payload: {}", capture.raw_payload_path);
            if let Some(reason) = &capture.quarantine_reason {
                println!("  quarantine reason: {reason}");
            }
        },
    }
    Ok(())
}
