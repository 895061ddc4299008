//! NodeStore Trait - Persistence Abstraction for Tree Nodes
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! flat tree records. Business logic in `NodeService` and the tree reconciler
//! only ever talks to this trait, so backends (in-memory, SurrealDB) can be
//! swapped without touching tree semantics.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: every method is async; each call is one suspension point
//! 2. **Version Tokens**: conditional writes compare the stored `version` with the
//!    caller's expected version and increment it on success
//! 3. **Conflicts Are Values**: a failed version check returns `None`/`false` or
//!    a skipped bulk entry, never an `Err`
//! 4. **No Transactions**: bulk writes apply entry by entry; callers layer their
//!    own all-or-nothing checks on top of `BulkWriteResult`
//!
//! # Examples
//!
//! ```rust,no_run
//! use docnode_core::db::{MemoryStore, NodeStore};
//! use docnode_core::models::{TreeNode, TreeNodeUpdate};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
//!
//!     let root = store.create_node(TreeNode::new_root("doc-1")).await?;
//!     let update = TreeNodeUpdate::new().with_children(vec!["page-1".to_string()]);
//!     let written = store
//!         .update_with_version_check(&root.id, root.version, update)
//!         .await?;
//!     assert!(written.is_some());
//!
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::{BulkWriteResult, DeleteResult, TreeNode, TreeNodeUpdate, VersionedUpdate};
use async_trait::async_trait;
use std::future::Future;

/// Abstraction layer for tree node persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single store handle can be
/// shared across concurrent requests for the lifetime of the process.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Create a new node record
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::DuplicateKey`] if a record with `node.id` exists.
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode, DatabaseError>;

    /// Get node by ID
    ///
    /// - `Ok(Some(node))` if the node exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError>;

    /// All records whose `document_id` matches, in no particular order
    async fn get_nodes_by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<TreeNode>, DatabaseError>;

    /// Apply `update` only if the stored version equals `expected_version`
    ///
    /// On success the version is incremented in the same write and the new
    /// record is returned. Returns `Ok(None)` without writing when the version
    /// no longer matches or the record is gone.
    async fn update_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
        update: TreeNodeUpdate,
    ) -> Result<Option<TreeNode>, DatabaseError>;

    /// Attempt every entry in order, each under its own version check
    ///
    /// Entries that fail their check are skipped and reported in
    /// [`BulkWriteResult::skipped`]. Entries already applied stay applied.
    ///
    /// A backend error after at least one entry was applied is reported through
    /// [`BulkWriteResult::failed`], not as `Err`, so callers can tell a partial
    /// apply from a write that never happened.
    async fn bulk_update_with_version_check(
        &self,
        updates: Vec<VersionedUpdate>,
    ) -> Result<BulkWriteResult, DatabaseError>;

    /// Remove a record unconditionally
    async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError>;

    /// Remove a record only if its version still matches
    ///
    /// Returns `true` when the record was deleted.
    async fn delete_with_version_check(
        &self,
        id: &str,
        expected_version: i64,
    ) -> Result<bool, DatabaseError>;

    /// Release backend resources; further calls fail with [`DatabaseError::Closed`]
    async fn close(&self) -> Result<(), DatabaseError>;
}

/// Run `updates` one at a time through `write`, stopping at the first error
///
/// Backends without multi-record transactions share this loop. An error on
/// the very first write is returned as-is since nothing was committed. Later
/// errors mark the failing entry and the rest as `failed`.
pub(crate) async fn apply_in_order<F, Fut>(
    updates: Vec<VersionedUpdate>,
    mut write: F,
) -> Result<BulkWriteResult, DatabaseError>
where
    F: FnMut(VersionedUpdate) -> Fut,
    Fut: Future<Output = Result<Option<TreeNode>, DatabaseError>>,
{
    let mut result = BulkWriteResult::default();
    let mut entries = updates.into_iter();

    while let Some(entry) = entries.next() {
        let node_id = entry.node_id.clone();
        match write(entry).await {
            Ok(Some(_)) => result.applied.push(node_id),
            Ok(None) => result.skipped.push(node_id),
            Err(e) if result.applied.is_empty() => return Err(e),
            Err(e) => {
                tracing::error!(
                    "Bulk write stopped at node {} after {} committed entries: {}",
                    node_id,
                    result.applied.len(),
                    e
                );
                result.failed.push(node_id);
                result.failed.extend(entries.map(|rest| rest.node_id));
                break;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ids: &[&str]) -> Vec<VersionedUpdate> {
        ids.iter()
            .map(|id| VersionedUpdate::new(*id, 1, TreeNodeUpdate::new()))
            .collect()
    }

    #[tokio::test]
    async fn test_error_midway_marks_rest_failed() {
        let result = apply_in_order(entries(&["a", "b", "c", "d"]), |entry| async move {
            match entry.node_id.as_str() {
                "b" => Ok(None),
                "c" => Err(DatabaseError::query_failed("connection reset")),
                _ => Ok(Some(TreeNode::new_child(entry.node_id, "doc", "doc"))),
            }
        })
        .await
        .unwrap();

        assert_eq!(result.applied, vec!["a".to_string()]);
        assert_eq!(result.skipped, vec!["b".to_string()]);
        assert_eq!(result.failed, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(result.attempted_count(), 4);
    }

    #[tokio::test]
    async fn test_error_before_any_write_is_returned() {
        let result = apply_in_order(entries(&["a", "b"]), |_| async {
            Err(DatabaseError::query_failed("connection reset"))
        })
        .await;
        assert!(matches!(result, Err(DatabaseError::QueryFailed { .. })));
    }
}
