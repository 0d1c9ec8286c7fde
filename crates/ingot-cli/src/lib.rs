//! ingot CLI - domain-scoped content ingestion and retrieval.
//!
//! This is the entry point for the `ingot` command-line interface.
//! Command implementations live in separate modules under
//! [`commands`]; this module wires argument parsing, logging, and
//! configuration together.

use anyhow::Result;
use clap::Parser;
use ingot_core::config::StorePaths;
use ingot_core::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands, OutputFormat};

/// Execute the ingot CLI with the currently configured environment.
///
/// # Errors
///
/// Returns an error if configuration loading or command execution
/// fails.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    let mut config = Config::from_env()?;
    if let Some(root) = cli.data_root.clone() {
        config.paths = StorePaths::from_data_root(root);
    }

    match cli.command {
        Commands::Ingest {
            domain,
            source_id,
            release_id,
            html,
            html_file,
            capture,
            force,
            created_by,
            format,
        } => {
            commands::ingest(
                &config,
                commands::IngestInput {
                    domain,
                    source_id,
                    release_id,
                    html,
                    html_file,
                    capture,
                    force,
                    created_by,
                },
                format,
            )
            .await
        },
        Commands::Capture {
            domain,
            source_id,
            url,
            file,
            timeout_s,
            clean,
            no_quarantine,
            format,
        } => {
            commands::capture(
                &config,
                &domain,
                &source_id,
                url.as_deref(),
                file.as_deref(),
                ingot_core::CaptureOptions {
                    timeout_s,
                    clean,
                    quarantine_suspicious: !no_quarantine,
                },
                format,
            )
            .await
        },
        Commands::Quarantine {
            domain,
            capture_id,
            reason,
            format,
        } => commands::quarantine(&config, &domain, &capture_id, reason.as_deref(), format),
        Commands::Batch {
            domain,
            manifest,
            release_id,
            created_by,
            continue_on_error,
            force,
            format,
        } => {
            commands::batch(
                &config,
                &domain,
                &manifest,
                ingot_core::BatchOptions {
                    release_id,
                    created_by,
                    continue_on_error,
                    force,
                },
                format,
            )
            .await
        },
        Commands::Merge {
            domain,
            sources,
            target,
            created_by,
            format,
        } => commands::merge(
            &config,
            &domain,
            &sources,
            target.as_deref(),
            created_by.as_deref(),
            format,
        ),
        Commands::Query {
            domain,
            query,
            top_k,
            release_id,
            filters,
            format,
        } => {
            commands::query(
                &config,
                &domain,
                &query,
                top_k,
                release_id.as_deref(),
                &filters,
                format,
            )
            .await
        },
        Commands::Releases { domain, format } => commands::list_releases(&config, &domain, format),
        Commands::Promote {
            domain,
            release_id,
            promoted_by,
            reason,
            format,
        } => commands::promote(
            &config,
            &domain,
            &release_id,
            promoted_by.as_deref(),
            reason.as_deref(),
            format,
        ),
        Commands::Audit {
            domain,
            limit,
            format,
        } => commands::audit(&config, &domain, limit, format),
        Commands::Gates { format } => commands::gates(&config, format),
        Commands::Events {
            domain,
            limit,
            format,
        } => commands::events(&config, &domain, limit, format),
        Commands::Metrics {
            domain,
            hours,
            format,
        } => commands::metrics(&config, &domain, hours, format),
    }
}

/// Initialize the logging subsystem based on CLI flags.
///
/// Informational logs go to stderr; JSON output suppresses them so
/// stdout stays machine-parseable.
fn initialize_logging(cli: &Cli) -> Result<()> {
    let mut level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    if !cli.verbose && command_format(&cli.command) == OutputFormat::Json {
        level = Level::ERROR;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

const fn command_format(command: &Commands) -> OutputFormat {
    match command {
        Commands::Ingest { format, .. }
        | Commands::Capture { format, .. }
        | Commands::Quarantine { format, .. }
        | Commands::Batch { format, .. }
        | Commands::Merge { format, .. }
        | Commands::Query { format, .. }
        | Commands::Releases { format, .. }
        | Commands::Promote { format, .. }
        | Commands::Audit { format, .. }
        | Commands::Gates { format, .. }
        | Commands::Events { format, .. }
        | Commands::Metrics { format, .. } => *format,
    }
}
