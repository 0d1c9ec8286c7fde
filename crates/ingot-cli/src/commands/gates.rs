//! Gates command implementation.

use anyhow::Result;
use ingot_core::{run_all_gates, Config};

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Exit code when gating checks report issues.
const GATE_FAILURE_EXIT: i32 = 2;

/// Execute the gates command. Exits the process with code 2 when any
/// issue is found.
pub fn execute(config: &Config, format: OutputFormat) -> Result<()> {
    let issues = run_all_gates(&config.paths);

    match format {
        OutputFormat::Json => print_json(&issues)?,
        OutputFormat::Text => {
            if issues.is_empty() {
                println!("Gates passed: no issues found");
            } else {
                println!("Gates failed with {} issue(s):", issues.len());
                for issue in &issues {
                    match &issue.path {
                        Some(path) => println!(
                            "- {}: {} ({})",
                            issue.code,
                            issue.message,
                            path.display()
                        ),
                        None => println!("- {}: {}", issue.code, issue.message),
                    }
                }
            }
        },
    }

    if !issues.is_empty() {
        std::process::exit(GATE_FAILURE_EXIT);
    }
    Ok(())
}
