//! Query command implementation.

use anyhow::{bail, Result};
use ingot_core::{AlignmentTags, Config, RetrievalService};

use crate::cli::OutputFormat;
use crate::commands::{print_json, snippet};

/// Execute the query command.
pub async fn execute(
    config: &Config,
    domain: &str,
    query: &str,
    top_k: usize,
    release_id: Option<&str>,
    raw_filters: &[String],
    format: OutputFormat,
) -> Result<()> {
    let filters = parse_filters(raw_filters)?;
    let service = RetrievalService::from_config(config)?;
    let response = service
        .query(domain, query, filters.as_ref(), top_k, release_id)
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Text => {
            println!(
                "{} results in {}/{}",
                response.results.len(),
                response.domain,
                response.release_id
            );
            for hit in &response.results {
                println!("  {:+.4}  {}  {}", hit.score, hit.chunk_id, snippet(&hit.text, 96));
            }
            for warning in &response.warnings {
                eprintln!("warning: {warning}");
            }
        },
    }
    Ok(())
}

/// Parse repeated `key=value` filter arguments into alignment tags.
fn parse_filters(raw: &[String]) -> Result<Option<AlignmentTags>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut tags = AlignmentTags::default();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("filter '{entry}' must be key=value");
        };
        let value = Some(value.to_string());
        match key {
            "concept_id" => tags.concept_id = value,
            "level" => tags.level = value,
            "graph_id" => tags.graph_id = value,
            "graph_version" => tags.graph_version = value,
            "dataset_version" => tags.dataset_version = value,
            "index_version" => tags.index_version = value,
            other => bail!(
                "unknown filter key '{other}' (expected concept_id, level, graph_id, \
                 graph_version, dataset_version, or index_version)"
            ),
        }
    }
    Ok(Some(tags))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_filter_keys() {
        let tags = parse_filters(&["level=intro".to_string(), "concept_id=c1".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(tags.level.as_deref(), Some("intro"));
        assert_eq!(tags.concept_id.as_deref(), Some("c1"));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_syntax() {
        assert!(parse_filters(&["color=red".to_string()]).is_err());
        assert!(parse_filters(&["no-equals".to_string()]).is_err());
    }

    #[test]
    fn empty_filters_are_none() {
        assert!(parse_filters(&[]).unwrap().is_none());
    }
}
