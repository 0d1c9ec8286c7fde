//! Primary entrypoint for the `ingot` CLI binary.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    ingot_cli::run().await
}
