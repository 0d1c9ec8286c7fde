#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used, dead_code)]

use assert_cmd::Command;

/// Command for the `ingot` binary with a clean environment for the
/// variables the CLI reads.
pub fn ingot_cmd() -> Command {
    let mut cmd = Command::cargo_bin("ingot").expect("ingot binary builds");
    cmd.env_remove("INGESTION_DATA_ROOT")
        .env_remove("VECTOR_INDEX_ROOT")
        .env_remove("RELEASES_ROOT")
        .env_remove("OBSERVABILITY_ROOT")
        .env_remove("INGESTION_SIGNING_SECRET")
        .env_remove("OLLAMA_EMBED_MODEL")
        .env_remove("RETRIEVAL_EMBED_PROVIDER")
        .env_remove("VECTOR_STORE_ADAPTER");
    cmd
}
