//! Command implementations for the ingot CLI.
//!
//! Each command lives in its own submodule; this module re-exports the
//! entry points and holds small shared output helpers.

mod batch;
mod capture;
mod gates;
mod ingest;
mod merge;
mod observe;
mod query;
mod release;

pub use batch::execute as batch;
pub use capture::{execute as capture, quarantine};
pub use gates::execute as gates;
pub use ingest::{execute as ingest, IngestInput};
pub use merge::execute as merge;
pub use observe::{events, metrics};
pub use query::execute as query;
pub use release::{audit, list_releases, promote};

use anyhow::Result;
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten text to one display line.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        out.push('…');
    }
    out
}
