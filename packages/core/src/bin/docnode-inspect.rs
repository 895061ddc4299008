//! Document Tree Inspection Binary
//!
//! Prints the nested page tree of one document and the result of checking its
//! stored records against the tree invariants. Useful after a reported
//! `PartialApply` or a detach that left dangling ids behind.
//!
//! # Usage
//!
//! ```bash
//! DOCNODE_STORE_BACKEND=surreal DOCNODE_DB_PATH=./data/docnode \
//!     cargo run --bin docnode-inspect --features surrealdb -- <document-id>
//!
//! # Only run the integrity check
//! cargo run --bin docnode-inspect --features surrealdb -- <document-id> --verify-only
//! ```
//!
//! # Environment Variables
//!
//! - `DOCNODE_STORE_BACKEND`, `DOCNODE_DB_PATH`, `DOCNODE_NAMESPACE`,
//!   `DOCNODE_DATABASE`: store selection (see `docnode_core::config`)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! Exits with status 2 when the document has integrity violations.

use anyhow::Context;
use clap::Parser;
use docnode_core::db::shared_store;
use docnode_core::{NodeService, StoreBackend, StoreConfig};

/// Print a document's page tree and integrity report
#[derive(Parser, Debug)]
#[command(name = "docnode-inspect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Document whose records are inspected
    document_id: String,

    /// Only run the integrity check
    #[arg(long)]
    verify_only: bool,
}

/// A fresh memory store is always empty, so inspecting one proves nothing
fn require_persistent_backend(config: &StoreConfig) -> anyhow::Result<()> {
    if config.backend == StoreBackend::Memory {
        anyhow::bail!(
            "docnode-inspect needs a persistent store; the memory backend starts empty in every process. \
             Set DOCNODE_STORE_BACKEND=surreal and DOCNODE_DB_PATH to the database directory"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = StoreConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    require_persistent_backend(&config)?;
    tracing::info!("Store backend: {:?}", config.backend);

    let store = shared_store(&config)
        .await
        .context("failed to open node store")?;
    let service = NodeService::new(store.clone());
    let document_id = args.document_id;

    if !args.verify_only {
        let tree = service.get_document_tree(&document_id).await?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
    }

    let report = service.verify_document_tree(&document_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    store.close().await?;

    if !report.is_consistent() {
        tracing::warn!(
            "Document {} failed {} integrity checks",
            document_id,
            report.violations.len()
        );
        std::process::exit(2);
    }

    Ok(())
}
