//! Merge command implementation.

use anyhow::Result;
use ingot_core::{merge_releases, Config, ContentStore, ReleaseManager};

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Execute the merge command.
pub fn execute(
    config: &Config,
    domain: &str,
    sources: &[String],
    target: Option<&str>,
    created_by: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let store = ContentStore::new(config.paths.clone());
    let releases = ReleaseManager::new(config.paths.releases_root.clone());
    let report = merge_releases(&store, &releases, domain, sources, target, created_by)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!(
                "Merged {} releases into {}",
                report.source_releases.len(),
                report.target_release_id
            );
            println!(
                "  {} rows written, {} duplicates skipped",
                report.rows_written, report.duplicates_skipped
            );
        },
    }
    Ok(())
}
