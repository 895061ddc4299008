//! SurrealStore - NodeStore Implementation for SurrealDB Backend
//!
//! Persists tree nodes in a single SCHEMALESS `tree_node` table of an embedded
//! SurrealDB instance. Each record id is `tree_node:<node id>`, and the plain
//! id is duplicated in a `uuid` field so query results deserialize without
//! parsing record ids.
//!
//! # Conditional Writes
//!
//! Version checks are folded into the write statement itself
//! (`UPDATE ... WHERE version = $expected`), so the compare and the write are a
//! single atomic statement. An empty result set means the check failed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docnode_core::db::{NodeStore, SurrealStore};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SurrealStore::new(PathBuf::from("./data/docnode.db")).await?;
//!     let nodes = store.get_nodes_by_document("doc-1").await?;
//!     println!("{} nodes", nodes.len());
//!     Ok(())
//! }
//! ```

use crate::db::node_store::apply_in_order;
use crate::db::{DatabaseError, NodeStore};
use crate::models::{BulkWriteResult, DeleteResult, TreeNode, TreeNodeUpdate, VersionedUpdate};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

pub const DEFAULT_NAMESPACE: &str = "docnode";
pub const DEFAULT_DATABASE: &str = "tree";

/// Internal struct matching the `tree_node` table layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SurrealNode {
    uuid: String,
    document_id: String,
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
    version: i64,
    created_at: String,
    modified_at: String,
}

/// Unreadable timestamps become the Unix epoch so they stand out instead of
/// passing for a recent write
fn parse_timestamp(node_id: &str, field: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(
                "Node {} has unreadable {} '{}' ({}); using the Unix epoch",
                node_id,
                field,
                raw,
                e
            );
            DateTime::<Utc>::default()
        }
    }
}

impl From<SurrealNode> for TreeNode {
    fn from(sn: SurrealNode) -> Self {
        let created_at = parse_timestamp(&sn.uuid, "created_at", &sn.created_at);
        let modified_at = parse_timestamp(&sn.uuid, "modified_at", &sn.modified_at);
        TreeNode {
            id: sn.uuid,
            document_id: sn.document_id,
            parent_id: sn.parent_id,
            children: sn.children,
            version: sn.version,
            created_at,
            modified_at,
        }
    }
}

impl From<&TreeNode> for SurrealNode {
    fn from(node: &TreeNode) -> Self {
        SurrealNode {
            uuid: node.id.clone(),
            document_id: node.document_id.clone(),
            parent_id: node.parent_id.clone(),
            children: node.children.clone(),
            version: node.version,
            created_at: node.created_at.to_rfc3339(),
            modified_at: node.modified_at.to_rfc3339(),
        }
    }
}

fn query_error(err: anyhow::Error) -> DatabaseError {
    DatabaseError::query_failed(format!("{:#}", err))
}

/// SurrealStore implements NodeStore for the SurrealDB embedded backend
pub struct SurrealStore {
    db: Arc<Surreal<Db>>,
    closed: AtomicBool,
}

impl SurrealStore {
    /// Open (or create) an on-disk store backed by RocksDB
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The parent directory cannot be created
    /// - RocksDB initialization fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::open(db_path, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Open an on-disk store using explicit namespace/database names
    pub async fn open(
        db_path: PathBuf,
        namespace: &str,
        database: &str,
    ) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() {
            return Err(DatabaseError::invalid_path(db_path));
        }
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db = Surreal::new::<RocksDb>(db_path.clone())
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e.to_string()))?;

        Self::finish_setup(db, namespace, database).await
    }

    /// Create a store on the in-memory engine (contents vanish with the process)
    pub async fn new_in_memory() -> Result<Self, DatabaseError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| DatabaseError::initialization_failed(e.to_string()))?;

        Self::finish_setup(db, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    async fn finish_setup(
        db: Surreal<Db>,
        namespace: &str,
        database: &str,
    ) -> Result<Self, DatabaseError> {
        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| DatabaseError::initialization_failed(e.to_string()))?;

        let db = Arc::new(db);
        Self::initialize_schema(&db).await?;

        tracing::info!("SurrealStore ready (ns={}, db={})", namespace, database);

        Ok(Self {
            db,
            closed: AtomicBool::new(false),
        })
    }

    async fn initialize_schema(db: &Surreal<Db>) -> Result<(), DatabaseError> {
        db.query(
            "
            DEFINE TABLE IF NOT EXISTS tree_node SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS tree_node_document ON tree_node FIELDS document_id;
            ",
        )
        .await
        .and_then(|response| response.check())
        .map_err(|e| DatabaseError::initialization_failed(e.to_string()))?;

        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        Ok(())
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: i64,
        update: TreeNodeUpdate,
    ) -> anyhow::Result<Option<TreeNode>> {
        let Some(current) = self.fetch(id).await? else {
            return Ok(None);
        };
        let mut next = current;
        next.apply(&update);

        let query = "
            UPDATE type::thing('tree_node', $uuid) SET
                document_id = $document_id,
                parent_id = $parent_id,
                children = $children,
                modified_at = $modified_at,
                version = version + 1
            WHERE version = $expected_version
            RETURN AFTER;
        ";

        let mut response = self
            .db
            .query(query)
            .bind(("uuid", id.to_string()))
            .bind(("document_id", next.document_id))
            .bind(("parent_id", next.parent_id))
            .bind(("children", next.children))
            .bind(("modified_at", Utc::now().to_rfc3339()))
            .bind(("expected_version", expected_version))
            .await
            .context("Failed to run conditional update")?;

        let updated: Vec<SurrealNode> = response
            .take(0)
            .context("Failed to extract conditional update result")?;

        Ok(updated.into_iter().map(Into::into).next())
    }

    async fn fetch(&self, id: &str) -> anyhow::Result<Option<TreeNode>> {
        let mut response = self
            .db
            .query("SELECT * FROM type::thing('tree_node', $uuid);")
            .bind(("uuid", id.to_string()))
            .await
            .context("Failed to query node by id")?;

        let nodes: Vec<SurrealNode> = response
            .take(0)
            .context("Failed to extract query results")?;

        Ok(nodes.into_iter().map(Into::into).next())
    }
}

#[async_trait]
impl NodeStore for SurrealStore {
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode, DatabaseError> {
        self.ensure_open()?;
        if self.fetch(&node.id).await.map_err(query_error)?.is_some() {
            return Err(DatabaseError::duplicate_key(&node.id));
        }

        self.db
            .query("CREATE type::thing('tree_node', $uuid) CONTENT $content;")
            .bind(("uuid", node.id.clone()))
            .bind(("content", SurrealNode::from(&node)))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                // A concurrent create can still win between the check and the write
                if e.to_string().contains("already exists") {
                    DatabaseError::duplicate_key(&node.id)
                } else {
                    DatabaseError::query_failed(format!("Failed to create node: {}", e))
                }
            })?;

        tracing::debug!("Created node {} in document {}", node.id, node.document_id);
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        self.fetch(id).await.map_err(query_error)
    }

    async fn get_nodes_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        let mut response = self
            .db
            .query("SELECT * FROM tree_node WHERE document_id = $document_id;")
            .bind(("document_id", document_id.to_string()))
            .await
            .context("Failed to query nodes by document")
            .map_err(query_error)?;

        let nodes: Vec<SurrealNode> = response
            .take(0)
            .context("Failed to extract query results")
            .map_err(query_error)?;

        Ok(nodes.into_iter().map(Into::into).collect())
    }

    async fn update_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
        update: TreeNodeUpdate,
    ) -> Result<Option<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        self.conditional_update(id, expected_version, update)
            .await
            .map_err(query_error)
    }

    async fn bulk_update_with_version_check(
        &self,
        updates: Vec<VersionedUpdate>,
    ) -> Result<BulkWriteResult, DatabaseError> {
        self.ensure_open()?;
        apply_in_order(updates, |entry| async move {
            self.conditional_update(&entry.node_id, entry.expected_version, entry.update)
                .await
                .map_err(query_error)
        })
        .await
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
        self.ensure_open()?;
        let mut response = self
            .db
            .query("DELETE type::thing('tree_node', $uuid) RETURN BEFORE;")
            .bind(("uuid", id.to_string()))
            .await
            .context("Failed to delete node")
            .map_err(query_error)?;

        let removed: Vec<SurrealNode> = response
            .take(0)
            .context("Failed to extract delete result")
            .map_err(query_error)?;

        Ok(if removed.is_empty() {
            DeleteResult::not_found()
        } else {
            DeleteResult::existed()
        })
    }

    async fn delete_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
    ) -> Result<bool, DatabaseError> {
        self.ensure_open()?;
        let mut response = self
            .db
            .query(
                "DELETE type::thing('tree_node', $uuid) WHERE version = $expected_version RETURN BEFORE;",
            )
            .bind(("uuid", id.to_string()))
            .bind(("expected_version", expected_version))
            .await
            .context("Failed to delete node with version check")
            .map_err(query_error)?;

        let removed: Vec<SurrealNode> = response
            .take(0)
            .context("Failed to extract delete result")
            .map_err(query_error)?;

        Ok(!removed.is_empty())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        // The embedded engine is released when the last handle drops
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
