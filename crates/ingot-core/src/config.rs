//! Configuration management for ingot.
//!
//! All runtime configuration is environment-driven: store roots,
//! embedding provider selection, signing, and the vector store adapter.
//! `Config::from_env` snapshots the environment once at process init;
//! nothing in the core re-reads variables afterwards.
//!
//! ## Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `INGESTION_DATA_ROOT` | base data root for all artifact stores |
//! | `VECTOR_INDEX_ROOT` | override for the vector index store |
//! | `RELEASES_ROOT` | override for release records and pointers |
//! | `OBSERVABILITY_ROOT` | override for event logs and counters |
//! | `INGESTION_SIGNING_SECRET` | HMAC key for capture signatures |
//! | `OLLAMA_EMBED_MODEL` | embedding model; literal `deterministic` selects the hash provider |
//! | `OLLAMA_URL` | remote embedder base URL |
//! | `OLLAMA_TIMEOUT_S` | remote embedder per-call timeout (seconds) |
//! | `RETRIEVAL_EMBED_PROVIDER` | explicit retrieval-side provider override |
//! | `RETRIEVAL_EMBED_DIM` | deterministic provider vector length |
//! | `RETRIEVAL_EMBED_MAX_CHARS` / `OLLAMA_EMBED_MAX_CHARS` | query trim bound |
//! | `VECTOR_STORE_ADAPTER` | vector store selection (`local` or empty) |

use std::path::PathBuf;

use crate::{Error, Result};

/// Default remote embedding model when none is configured.
pub const DEFAULT_EMBED_MODEL: &str = "mxbai-embed-large";
/// Default remote embedder endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default remote embedder timeout in seconds.
pub const DEFAULT_OLLAMA_TIMEOUT_S: u64 = 60;
/// Default deterministic embedding dimension.
pub const DEFAULT_EMBED_DIM: usize = 16;
/// Default maximum query length passed to the embedder.
pub const DEFAULT_QUERY_MAX_CHARS: usize = 2000;

/// Which embedding provider a side of the system uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// SHA-256 based deterministic vectors; test/CI friendly.
    Deterministic,
    /// Remote HTTP embedder speaking the Ollama embeddings API.
    Ollama,
}

impl ProviderKind {
    /// Stable name used in provider-mismatch warnings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Ollama => "ollama",
        }
    }
}

/// Filesystem roots for every artifact family.
///
/// Per-kind roots default to subdirectories of the data root but may be
/// relocated independently via their override variables.
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Base data root.
    pub data_root: PathBuf,
    /// Raw capture payloads and metadata.
    pub captures_root: PathBuf,
    /// Canonical learning objects.
    pub canonical_root: PathBuf,
    /// Persisted chunk records.
    pub chunks_root: PathBuf,
    /// Persisted embedding records.
    pub embeddings_root: PathBuf,
    /// Vector index files.
    pub vector_index_root: PathBuf,
    /// Release records, active pointers, audit logs.
    pub releases_root: PathBuf,
    /// Observability event logs and counters.
    pub observability_root: PathBuf,
}

impl StorePaths {
    /// Derive the full layout from a single data root.
    #[must_use]
    pub fn from_data_root(data_root: PathBuf) -> Self {
        Self {
            captures_root: data_root.join("captures"),
            canonical_root: data_root.join("canonical"),
            chunks_root: data_root.join("chunks"),
            embeddings_root: data_root.join("embeddings"),
            vector_index_root: data_root.join("vector_index"),
            releases_root: data_root.join("releases"),
            observability_root: data_root.join("observability"),
            data_root,
        }
    }
}

/// Embedding provider selection and tuning.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Provider used when ingesting content.
    pub ingestion_provider: ProviderKind,
    /// Provider used when embedding retrieval queries.
    pub retrieval_provider: ProviderKind,
    /// Remote model name.
    pub model: String,
    /// Remote endpoint base URL.
    pub base_url: String,
    /// Remote per-call timeout in seconds.
    pub timeout_s: u64,
    /// Deterministic provider dimension.
    pub dim: usize,
    /// Queries longer than this are trimmed before embedding.
    pub query_max_chars: usize,
}

/// Snapshot of all runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store layout.
    pub paths: StorePaths,
    /// Embedding configuration.
    pub embedding: EmbeddingConfig,
    /// HMAC signing secret, if configured.
    pub signing_secret: Option<String>,
    /// Vector store adapter name (empty selects the local JSONL store).
    pub vector_store_adapter: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Falls back to `$XDG_DATA_HOME/ingot`, then `~/.ingot`, when
    /// `INGESTION_DATA_ROOT` is unset.
    pub fn from_env() -> Result<Self> {
        let data_root = match env_path("INGESTION_DATA_ROOT") {
            Some(root) => root,
            None => default_data_root()?,
        };
        let mut config = Self::with_data_root(data_root);

        if let Some(root) = env_path("VECTOR_INDEX_ROOT") {
            config.paths.vector_index_root = root;
        }
        if let Some(root) = env_path("RELEASES_ROOT") {
            config.paths.releases_root = root;
        }
        if let Some(root) = env_path("OBSERVABILITY_ROOT") {
            config.paths.observability_root = root;
        }

        config.signing_secret = env_nonempty("INGESTION_SIGNING_SECRET");
        config.vector_store_adapter =
            env_nonempty("VECTOR_STORE_ADAPTER").unwrap_or_default();

        let model = env_nonempty("OLLAMA_EMBED_MODEL");
        config.embedding.ingestion_provider = ingestion_provider(model.as_deref());
        config.embedding.retrieval_provider =
            match env_nonempty("RETRIEVAL_EMBED_PROVIDER").as_deref() {
                Some(raw) if raw.eq_ignore_ascii_case("ollama") => ProviderKind::Ollama,
                Some(_) => ProviderKind::Deterministic,
                None => config.embedding.ingestion_provider,
            };
        if let Some(model) = model {
            if !model.eq_ignore_ascii_case("deterministic") {
                config.embedding.model = model;
            }
        }
        if let Some(url) = env_nonempty("OLLAMA_URL") {
            config.embedding.base_url = url;
        }
        config.embedding.timeout_s =
            env_parse("OLLAMA_TIMEOUT_S", DEFAULT_OLLAMA_TIMEOUT_S);
        config.embedding.dim = env_parse("RETRIEVAL_EMBED_DIM", DEFAULT_EMBED_DIM);
        config.embedding.query_max_chars = env_nonempty("RETRIEVAL_EMBED_MAX_CHARS")
            .and_then(|raw| raw.parse().ok())
            .or_else(|| {
                env_nonempty("OLLAMA_EMBED_MAX_CHARS").and_then(|raw| raw.parse().ok())
            })
            .unwrap_or(DEFAULT_QUERY_MAX_CHARS);

        Ok(config)
    }

    /// Build a configuration rooted at an explicit data directory with
    /// every other knob at its default. Primarily for tests and the
    /// CLI `--data-root` override.
    #[must_use]
    pub fn with_data_root(data_root: PathBuf) -> Self {
        Self {
            paths: StorePaths::from_data_root(data_root),
            embedding: EmbeddingConfig {
                ingestion_provider: ProviderKind::Deterministic,
                retrieval_provider: ProviderKind::Deterministic,
                model: DEFAULT_EMBED_MODEL.to_string(),
                base_url: DEFAULT_OLLAMA_URL.to_string(),
                timeout_s: DEFAULT_OLLAMA_TIMEOUT_S,
                dim: DEFAULT_EMBED_DIM,
                query_max_chars: DEFAULT_QUERY_MAX_CHARS,
            },
            signing_secret: None,
            vector_store_adapter: String::new(),
        }
    }
}

/// Ingestion-side provider rule: `ollama` iff a model is configured
/// and it is not the literal `deterministic`.
fn ingestion_provider(model: Option<&str>) -> ProviderKind {
    match model {
        Some(model) if !model.eq_ignore_ascii_case("deterministic") => {
            ProviderKind::Ollama
        },
        _ => ProviderKind::Deterministic,
    }
}

fn default_data_root() -> Result<PathBuf> {
    if let Some(xdg) = env_nonempty("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("ingot"));
    }
    let base = directories::BaseDirs::new()
        .ok_or_else(|| Error::Config("Failed to determine home directory".into()))?;
    Ok(base.home_dir().join(".ingot"))
}

fn env_nonempty(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_nonempty(name).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_nonempty(name)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_paths_derive_from_data_root() {
        let paths = StorePaths::from_data_root(PathBuf::from("/tmp/ingot"));
        assert_eq!(paths.captures_root, PathBuf::from("/tmp/ingot/captures"));
        assert_eq!(paths.canonical_root, PathBuf::from("/tmp/ingot/canonical"));
        assert_eq!(paths.chunks_root, PathBuf::from("/tmp/ingot/chunks"));
        assert_eq!(
            paths.embeddings_root,
            PathBuf::from("/tmp/ingot/embeddings")
        );
        assert_eq!(
            paths.vector_index_root,
            PathBuf::from("/tmp/ingot/vector_index")
        );
        assert_eq!(paths.releases_root, PathBuf::from("/tmp/ingot/releases"));
        assert_eq!(
            paths.observability_root,
            PathBuf::from("/tmp/ingot/observability")
        );
    }

    #[test]
    fn ingestion_provider_rule() {
        assert_eq!(ingestion_provider(None), ProviderKind::Deterministic);
        assert_eq!(
            ingestion_provider(Some("deterministic")),
            ProviderKind::Deterministic
        );
        assert_eq!(
            ingestion_provider(Some("Deterministic")),
            ProviderKind::Deterministic
        );
        assert_eq!(
            ingestion_provider(Some("mxbai-embed-large")),
            ProviderKind::Ollama
        );
    }

    #[test]
    fn with_data_root_uses_defaults() {
        let config = Config::with_data_root(PathBuf::from("/tmp/x"));
        assert_eq!(
            config.embedding.ingestion_provider,
            ProviderKind::Deterministic
        );
        assert_eq!(config.embedding.dim, DEFAULT_EMBED_DIM);
        assert_eq!(config.embedding.query_max_chars, DEFAULT_QUERY_MAX_CHARS);
        assert!(config.signing_secret.is_none());
        assert!(config.vector_store_adapter.is_empty());
    }
}
