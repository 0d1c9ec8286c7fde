//! Retrieval: resolve the active release, embed the query, and run a
//! filtered cosine search.
//!
//! Retrieval never crosses a `(domain, release_id)` boundary: the
//! release is either supplied by the caller or resolved through the
//! domain's active-release pointer, and the vector store is scoped to
//! exactly that pair.

use serde::Serialize;

use crate::config::{Config, ProviderKind};
use crate::embedder::{build_provider, EmbeddingProvider};
use crate::releases::ReleaseManager;
use crate::types::AlignmentTags;
use crate::util::truncate_chars;
use crate::vector::{build_vector_store, QueryHit, VectorStore};
use crate::{Error, Result};

/// A retrieval response: ranked hits plus operational warnings.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    /// Tenant namespace queried.
    pub domain: String,
    /// Release the query resolved to.
    pub release_id: String,
    /// Ranked results, best first.
    pub results: Vec<QueryHit>,
    /// Human-readable warnings (e.g. provider mismatch).
    pub warnings: Vec<String>,
}

/// Release resolution + query embedding + vector search.
pub struct RetrievalService {
    releases: ReleaseManager,
    vector_store: Box<dyn VectorStore>,
    embedder: Box<dyn EmbeddingProvider>,
    ingestion_provider: ProviderKind,
    retrieval_provider: ProviderKind,
    query_max_chars: usize,
}

impl RetrievalService {
    /// Wire up retrieval from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            releases: ReleaseManager::new(config.paths.releases_root.clone()),
            vector_store: build_vector_store(
                &config.vector_store_adapter,
                config.paths.vector_index_root.clone(),
            )?,
            embedder: build_provider(config.embedding.retrieval_provider, &config.embedding)?,
            ingestion_provider: config.embedding.ingestion_provider,
            retrieval_provider: config.embedding.retrieval_provider,
            query_max_chars: config.embedding.query_max_chars,
        })
    }

    fn resolve_release(&self, domain: &str, release_id: Option<&str>) -> Result<String> {
        if let Some(release_id) = release_id {
            if !release_id.trim().is_empty() {
                return Ok(release_id.to_string());
            }
        }
        self.releases
            .get_active_release(domain)?
            .ok_or_else(|| {
                Error::NotFound(format!("No active release set for domain '{domain}'"))
            })
    }

    /// Query one domain's resolved release.
    pub async fn query(
        &self,
        domain: &str,
        query: &str,
        filters: Option<&AlignmentTags>,
        top_k: usize,
        release_id: Option<&str>,
    ) -> Result<RetrievalResponse> {
        if domain.trim().is_empty() {
            return Err(Error::Validation("domain is required".to_string()));
        }
        let trimmed = truncate_chars(query.trim(), self.query_max_chars);
        if trimmed.is_empty() {
            return Err(Error::Validation("query is required".to_string()));
        }

        let resolved = self.resolve_release(domain, release_id)?;
        let query_text = trimmed.to_string();
        let vector = self
            .embedder
            .embed_texts(std::slice::from_ref(&query_text))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("embedder returned no vector".to_string()))?;

        let results = self
            .vector_store
            .query(domain, &resolved, &vector, filters, top_k)?;

        let mut warnings = Vec::new();
        if self.ingestion_provider != self.retrieval_provider {
            warnings.push(format!(
                "Embedding provider mismatch: ingestion uses {}, retrieval uses {}. \
                 Set RETRIEVAL_EMBED_PROVIDER to match ingestion.",
                self.ingestion_provider.as_str(),
                self.retrieval_provider.as_str()
            ));
        }

        Ok(RetrievalResponse {
            domain: domain.to_string(),
            release_id: resolved,
            results,
            warnings,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::{IngestionRequest, Pipeline};
    use tempfile::TempDir;

    const HTML: &str = "<h1>Install Guide</h1>\
        <p>Run the install command to configure the service.</p>\
        <p>Use the deploy command to apply the configuration.</p>";

    async fn ingest(config: &Config, release_id: &str) {
        let pipeline = Pipeline::from_config(config).unwrap();
        pipeline
            .run(&IngestionRequest {
                domain: "tf".to_string(),
                source_id: "s1".to_string(),
                release_id: release_id.to_string(),
                raw_html: HTML.to_string(),
                created_by: None,
                write_release: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_resolves_explicit_release() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        ingest(&config, "r1").await;

        let service = RetrievalService::from_config(&config).unwrap();
        let response = service
            .query("tf", "install", None, 3, Some("r1"))
            .await
            .unwrap();

        assert_eq!(response.domain, "tf");
        assert_eq!(response.release_id, "r1");
        assert!(!response.results.is_empty());
        assert!(response.results.len() <= 3);
        assert!(response.warnings.is_empty());
        for hit in &response.results {
            assert_eq!(hit.domain, "tf");
            assert_eq!(hit.release_id, "r1");
            assert!((-1.0..=1.0).contains(&hit.score));
        }
        // Results are ordered best-first with chunk_id tiebreak.
        for pair in response.results.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || ((pair[0].score - pair[1].score).abs() < f32::EPSILON
                        && pair[0].chunk_id < pair[1].chunk_id)
            );
        }
    }

    #[tokio::test]
    async fn query_resolves_active_release_after_promotion() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        ingest(&config, "r1").await;
        ingest(&config, "r2").await;

        let releases = ReleaseManager::new(config.paths.releases_root.clone());
        releases.promote_release("tf", "r2", None, None).unwrap();

        let service = RetrievalService::from_config(&config).unwrap();
        let response = service.query("tf", "install", None, 5, None).await.unwrap();
        assert_eq!(response.release_id, "r2");
    }

    #[tokio::test]
    async fn no_active_release_is_not_found() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        let service = RetrievalService::from_config(&config).unwrap();
        let err = service.query("tf", "install", None, 5, None).await.unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[tokio::test]
    async fn empty_inputs_are_validation_errors() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        let service = RetrievalService::from_config(&config).unwrap();

        let err = service.query("", "install", None, 5, None).await.unwrap_err();
        assert_eq!(err.category(), "validation");
        let err = service.query("tf", "   ", None, 5, None).await.unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[tokio::test]
    async fn long_queries_are_trimmed_not_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_data_root(temp.path().to_path_buf());
        config.embedding.query_max_chars = 10;
        ingest(&config, "r1").await;

        let service = RetrievalService::from_config(&config).unwrap();
        let long_query = "install ".repeat(100);
        let response = service
            .query("tf", &long_query, None, 3, Some("r1"))
            .await
            .unwrap();
        assert!(!response.results.is_empty());
    }

    #[tokio::test]
    async fn provider_mismatch_adds_warning() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_data_root(temp.path().to_path_buf());
        ingest(&config, "r1").await;

        config.embedding.ingestion_provider = ProviderKind::Ollama;
        config.embedding.retrieval_provider = ProviderKind::Deterministic;
        let service = RetrievalService::from_config(&config).unwrap();
        let response = service
            .query("tf", "install", None, 3, Some("r1"))
            .await
            .unwrap();
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("mismatch"));
    }

    #[tokio::test]
    async fn top_k_zero_returns_empty() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_root(temp.path().to_path_buf());
        ingest(&config, "r1").await;
        let service = RetrievalService::from_config(&config).unwrap();
        let response = service
            .query("tf", "install", None, 0, Some("r1"))
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }
}
