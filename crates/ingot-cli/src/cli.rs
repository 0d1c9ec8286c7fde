//! # CLI Structure and Argument Parsing
//!
//! The `ingot` command surface is a thin shell over `ingot-core`: one
//! subcommand per operation, built with clap derive macros.
//!
//! ```bash
//! # Capture a URL, then ingest it into a release
//! ingot capture --domain terraform --source-id intro --url https://example.com/docs
//! ingot ingest --domain terraform --source-id intro --release-id r1 --capture intro
//!
//! # Search the active release
//! ingot promote --domain terraform --release-id r1
//! ingot query --domain terraform "how do I install"
//!
//! # Validate everything on disk
//! ingot gates
//! ```
//!
//! Most commands accept `--format json` for machine-readable output;
//! informational logs go to stderr so stdout stays parseable.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output rendering for commands that report data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Main CLI structure for the `ingot` command.
#[derive(Debug, Parser)]
#[command(
    name = "ingot",
    version,
    about = "Domain-scoped content ingestion and retrieval",
    propagate_version = true
)]
pub struct Cli {
    /// Override the data root (otherwise INGESTION_DATA_ROOT or the
    /// default location is used)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All `ingot` subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest raw HTML into a release
    Ingest {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Logical source document id
        #[arg(long)]
        source_id: String,
        /// Release to ingest into
        #[arg(long)]
        release_id: String,
        /// Inline raw HTML
        #[arg(long, conflicts_with_all = ["html_file", "capture"])]
        html: Option<String>,
        /// Read raw HTML from a file
        #[arg(long, value_name = "FILE", conflicts_with = "capture")]
        html_file: Option<PathBuf>,
        /// Read raw HTML from a stored capture
        #[arg(long, value_name = "CAPTURE_ID")]
        capture: Option<String>,
        /// Use quarantined or failed captures anyway
        #[arg(long)]
        force: bool,
        /// Attribution recorded on the release
        #[arg(long)]
        created_by: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Capture a URL or local file as a raw document snapshot
    Capture {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Logical source document id (also the capture id)
        #[arg(long)]
        source_id: String,
        /// URL to fetch
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,
        /// Local file to capture instead of fetching
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        /// Fetch timeout in seconds
        #[arg(long, default_value_t = ingot_core::capture::DEFAULT_CAPTURE_TIMEOUT_S)]
        timeout_s: u64,
        /// Also store a cleaned-text rendition
        #[arg(long)]
        clean: bool,
        /// Do not auto-quarantine failed captures
        #[arg(long)]
        no_quarantine: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Mark a capture quarantined
    Quarantine {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Capture to quarantine
        #[arg(long)]
        capture_id: String,
        /// Why the capture is being quarantined
        #[arg(long)]
        reason: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Ingest many items into one release from a manifest
    Batch {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// JSON manifest: an array of {source_id, raw_html|path|capture_id|url}
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,
        /// Reuse this release id instead of generating one
        #[arg(long)]
        release_id: Option<String>,
        /// Attribution recorded on the release
        #[arg(long)]
        created_by: Option<String>,
        /// Keep going after item failures
        #[arg(long)]
        continue_on_error: bool,
        /// Use quarantined or failed captures anyway
        #[arg(long)]
        force: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Merge several releases into a new one
    Merge {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Source release (repeat; at least two required)
        #[arg(long = "source", value_name = "RELEASE_ID")]
        sources: Vec<String>,
        /// Target release id (generated when omitted)
        #[arg(long)]
        target: Option<String>,
        /// Attribution recorded on the target release
        #[arg(long)]
        created_by: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Semantic search over a domain's active (or given) release
    Query {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Query text
        query: String,
        /// Maximum results
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Query a specific release instead of the active one
        #[arg(long)]
        release_id: Option<String>,
        /// Filter results (key=value; repeatable). Keys: concept_id,
        /// level, graph_id, graph_version, dataset_version, index_version
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List a domain's releases and its active pointer
    Releases {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Promote a release to active
    Promote {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Release to activate
        #[arg(long)]
        release_id: String,
        /// Who is promoting
        #[arg(long)]
        promoted_by: Option<String>,
        /// Why
        #[arg(long)]
        reason: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show the promotion audit log, newest first
    Audit {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Maximum events
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Run offline integrity gates over the stores (exit 2 on issues)
    Gates {
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show recent observability events, newest first
    Events {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Maximum events
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Summarize recent events and alerts for a domain
    Metrics {
        /// Tenant domain
        #[arg(long)]
        domain: String,
        /// Window size in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_parses_filters_and_defaults() {
        let cli = Cli::parse_from([
            "ingot", "query", "--domain", "tf", "install", "--filter", "level=intro",
        ]);
        match cli.command {
            Commands::Query {
                domain,
                query,
                top_k,
                filters,
                ..
            } => {
                assert_eq!(domain, "tf");
                assert_eq!(query, "install");
                assert_eq!(top_k, 5);
                assert_eq!(filters, vec!["level=intro".to_string()]);
            },
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn ingest_sources_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "ingot",
            "ingest",
            "--domain",
            "tf",
            "--source-id",
            "s1",
            "--release-id",
            "r1",
            "--html",
            "<p>x</p>",
            "--capture",
            "c1",
        ]);
        assert!(result.is_err());
    }
}
