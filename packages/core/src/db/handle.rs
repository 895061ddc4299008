//! Process-wide store handle
//!
//! The first caller initializes the store from its `StoreConfig`; every later
//! caller receives the same `Arc` regardless of the config it passes. The
//! handle lives for the rest of the process and is never torn down.

use crate::config::{StoreBackend, StoreConfig};
use crate::db::{DatabaseError, MemoryStore, NodeStore};
use std::sync::Arc;
use tokio::sync::OnceCell;

static SHARED_STORE: OnceCell<Arc<dyn NodeStore>> = OnceCell::const_new();

/// Get the process-wide store, initializing it on first use
pub async fn shared_store(config: &StoreConfig) -> Result<Arc<dyn NodeStore>, DatabaseError> {
    SHARED_STORE
        .get_or_try_init(|| open_store(config))
        .await
        .cloned()
}

/// Open a new store for `config` without touching the shared handle
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn NodeStore>, DatabaseError> {
    config
        .validate()
        .map_err(DatabaseError::initialization_failed)?;

    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory node store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Surreal => open_surreal(config).await,
    }
}

#[cfg(feature = "surrealdb")]
async fn open_surreal(config: &StoreConfig) -> Result<Arc<dyn NodeStore>, DatabaseError> {
    let path = config
        .database_path
        .clone()
        .ok_or_else(|| DatabaseError::initialization_failed("database path is required"))?;
    tracing::info!("Opening SurrealDB node store at {}", path.display());
    let store =
        crate::db::SurrealStore::open(path, &config.namespace, &config.database).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "surrealdb"))]
async fn open_surreal(_config: &StoreConfig) -> Result<Arc<dyn NodeStore>, DatabaseError> {
    Err(DatabaseError::initialization_failed(
        "surreal backend requested but the `surrealdb` feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TreeNode;

    #[tokio::test]
    async fn test_shared_store_is_initialized_once() {
        let config = StoreConfig::default();
        let first = shared_store(&config).await.unwrap();
        let second = shared_store(&config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first
            .create_node(TreeNode::new_root("handle-test-doc"))
            .await
            .unwrap();
        assert!(second.get_node("handle-test-doc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_store_rejects_invalid_config() {
        let config = StoreConfig {
            backend: StoreBackend::Surreal,
            database_path: None,
            ..StoreConfig::default()
        };
        assert!(open_store(&config).await.is_err());
    }
}
