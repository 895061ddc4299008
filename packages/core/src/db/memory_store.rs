//! MemoryStore - In-Process NodeStore Implementation
//!
//! Keeps every record in a `HashMap` behind a tokio `RwLock`. A record
//! operation holds the lock for its whole read-compare-write, so each
//! conditional write is atomic with respect to other callers. A bulk write
//! holds the lock across all of its entries.

use crate::db::{DatabaseError, NodeStore};
use crate::models::{BulkWriteResult, DeleteResult, TreeNode, TreeNodeUpdate, VersionedUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// NodeStore backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<String, TreeNode>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        Ok(())
    }
}

/// Compare-and-write a single record; caller holds the write lock
fn apply_versioned(
    nodes: &mut HashMap<String, TreeNode>,
    id: &str,
    expected_version: i64,
    update: &TreeNodeUpdate,
) -> Option<TreeNode> {
    let node = nodes.get_mut(id)?;
    if node.version != expected_version {
        return None;
    }
    node.apply(update);
    node.version += 1;
    node.modified_at = Utc::now();
    Some(node.clone())
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode, DatabaseError> {
        self.ensure_open()?;
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(DatabaseError::duplicate_key(&node.id));
        }
        tracing::debug!("Creating node {} in document {}", node.id, node.document_id);
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn get_nodes_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .filter(|node| node.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn update_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
        update: TreeNodeUpdate,
    ) -> Result<Option<TreeNode>, DatabaseError> {
        self.ensure_open()?;
        let mut nodes = self.nodes.write().await;
        let written = apply_versioned(&mut nodes, id, expected_version, &update);
        if written.is_none() {
            tracing::debug!(
                "Conditional update skipped for node {} (expected version {})",
                id,
                expected_version
            );
        }
        Ok(written)
    }

    async fn bulk_update_with_version_check(
        &self,
        updates: Vec<VersionedUpdate>,
    ) -> Result<BulkWriteResult, DatabaseError> {
        self.ensure_open()?;
        let mut nodes = self.nodes.write().await;
        let mut result = BulkWriteResult::default();
        for entry in updates {
            match apply_versioned(&mut nodes, &entry.node_id, entry.expected_version, &entry.update)
            {
                Some(_) => result.applied.push(entry.node_id),
                None => result.skipped.push(entry.node_id),
            }
        }
        Ok(result)
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
        self.ensure_open()?;
        let removed = self.nodes.write().await.remove(id);
        Ok(if removed.is_some() {
            DeleteResult::existed()
        } else {
            DeleteResult::not_found()
        })
    }

    async fn delete_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
    ) -> Result<bool, DatabaseError> {
        self.ensure_open()?;
        let mut nodes = self.nodes.write().await;
        let matched = nodes
            .get(id)
            .is_some_and(|node| node.version == expected_version);
        if matched {
            nodes.remove(id);
        }
        Ok(matched)
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
