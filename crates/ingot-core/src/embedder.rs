//! Embedding provider adapters and the file-backed embedding store.
//!
//! Two providers implement the [`EmbeddingProvider`] capability
//! interface: a deterministic SHA-256 hash provider for tests and
//! CI-friendly local runs, and a remote HTTP provider speaking the
//! Ollama embeddings API. Selection happens once at process init from
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::types::{Chunk, EmbeddingRecord};
use crate::util::sha256_hex;
use crate::{Error, Result};

/// Capability interface: turn texts into vectors, element-wise.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each text; the result has one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Stable provider name used in mismatch warnings.
    fn name(&self) -> &'static str;
}

/// Deterministic embedding provider based on SHA-256.
///
/// Not semantically meaningful; exists so local runs and tests produce
/// identical vectors for identical text.
#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    dim: usize,
}

impl DeterministicEmbedder {
    /// Create a provider emitting vectors of the given dimension.
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dim)
            .map(|i| (f32::from(digest[i % digest.len()]) / 255.0).mul_add(2.0, -1.0))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &'static str {
        "deterministic"
    }
}

/// Remote embeddings via an Ollama-compatible HTTP endpoint.
///
/// Calls `POST <base_url>/api/embeddings` with `{"model", "prompt"}`
/// and expects `{"embedding": [..]}` back.
pub struct OllamaEmbedder {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

impl OllamaEmbedder {
    /// Create a provider with a per-call timeout.
    pub fn new(model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ingot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&OllamaRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "embedding backend returned HTTP {status}: {body}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("unparseable embedding response: {e}")))?;
        let Some(values) = payload.get("embedding").and_then(|v| v.as_array()) else {
            return Err(Error::Backend(format!(
                "embedding response missing 'embedding': {payload}"
            )));
        };
        if values.is_empty() {
            return Err(Error::Backend(
                "embedding response contained an empty vector".to_string(),
            ));
        }
        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| {
                        Error::Backend("embedding vector contained a non-number".to_string())
                    })
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Build the configured provider for one side of the system.
pub fn build_provider(
    kind: ProviderKind,
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match kind {
        ProviderKind::Deterministic => Ok(Box::new(DeterministicEmbedder::new(config.dim))),
        ProviderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(
            &config.model,
            &config.base_url,
            Duration::from_secs(config.timeout_s),
        )?)),
    }
}

/// File-backed embedding store.
///
/// Vectors are persisted one JSON file per chunk, named
/// `<chunk_id>_emb_<hash>.json`, and referenced as `file:<path>`.
#[derive(Debug, Clone)]
pub struct FileEmbeddingStore {
    root: PathBuf,
}

impl FileEmbeddingStore {
    /// Create a store rooted at the embeddings root. Relative roots are
    /// absolutized so `embedding_ref` paths resolve from anywhere.
    pub fn new(root: PathBuf) -> Result<Self> {
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self { root })
    }

    /// Persist one vector and return its `file:` reference.
    pub fn put(
        &self,
        domain: &str,
        release_id: &str,
        chunk_id: &str,
        vector: &[f32],
    ) -> Result<String> {
        let compact = serde_json::to_string(vector)?;
        let emb_id = format!("emb_{}", &sha256_hex(&compact)[..24]);
        let dest = self
            .root
            .join(domain)
            .join(release_id)
            .join(format!("{chunk_id}_{emb_id}.json"));

        let record = EmbeddingRecord {
            chunk_id: chunk_id.to_string(),
            domain: domain.to_string(),
            release_id: release_id.to_string(),
            vector: vector.to_vec(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        crate::store::write_atomic(&dest, &json)?;
        debug!("Stored embedding {}", dest.display());
        Ok(format!("file:{}", dest.display()))
    }
}

/// Embed every chunk's text and attach the resulting `embedding_ref`.
///
/// Returns new chunks; the input is not mutated.
pub async fn attach_embeddings(
    chunks: &[Chunk],
    provider: &dyn EmbeddingProvider,
    store: &FileEmbeddingStore,
) -> Result<Vec<Chunk>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = provider.embed_texts(&texts).await?;

    let mut out = Vec::with_capacity(chunks.len());
    for (chunk, vector) in chunks.iter().zip(vectors) {
        let reference = store.put(&chunk.domain, &chunk.release_id, &chunk.chunk_id, &vector)?;
        let mut attached = chunk.clone();
        attached.embedding_ref = Some(reference);
        out.push(attached);
    }
    Ok(out)
}
