//! Conflict retry queue for point mutations
//!
//! Point mutations in [`NodeService`] read the records they touch, then write
//! under a version check. When another writer gets in between, the write is
//! refused with `VersionConflict` and nothing is changed. Because every call
//! rereads fresh records, replaying the whole call is safe.
//!
//! `ConflictRetryQueue` does that replay with exponential backoff. Only
//! `VersionConflict` is retried; every other error is returned immediately.
//!
//! # Example
//!
//! ```rust
//! use docnode_core::db::MemoryStore;
//! use docnode_core::operations::ConflictRetryQueue;
//! use docnode_core::services::NodeService;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(NodeService::new(Arc::new(MemoryStore::new())));
//! service.register_document_node("D1").await?;
//!
//! // Retry up to 3 times with exponential backoff (10ms, 20ms, 40ms)
//! let queue = ConflictRetryQueue::new(service);
//! queue.insert_first_in_document("D1", "P1", 3).await?;
//! # Ok(())
//! # }
//! ```

use crate::models::TreeNode;
use crate::services::{NodeService, NodeServiceError};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;

/// Base delay before the first retry; doubled on each further attempt
const BASE_BACKOFF_MS: u64 = 10;

/// Replays point mutations that lost a version check
pub struct ConflictRetryQueue {
    service: Arc<NodeService>,
}

impl ConflictRetryQueue {
    pub fn new(service: Arc<NodeService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<NodeService> {
        &self.service
    }

    /// [`NodeService::insert_first_in_document`] with retry
    pub async fn insert_first_in_document(
        &self,
        document_id: &str,
        page_id: &str,
        max_retries: usize,
    ) -> Result<TreeNode, NodeServiceError> {
        self.run_with_retry("insert_first_in_document", page_id, max_retries, || {
            self.service.insert_first_in_document(document_id, page_id)
        })
        .await
    }

    /// [`NodeService::insert_first_child`] with retry
    pub async fn insert_first_child(
        &self,
        target_id: &str,
        document_id: &str,
        page_id: &str,
        max_retries: usize,
    ) -> Result<TreeNode, NodeServiceError> {
        self.run_with_retry("insert_first_child", page_id, max_retries, || {
            self.service
                .insert_first_child(target_id, document_id, page_id)
        })
        .await
    }

    /// [`NodeService::append_next_sibling`] with retry
    pub async fn append_next_sibling(
        &self,
        target_id: &str,
        document_id: &str,
        page_id: &str,
        max_retries: usize,
    ) -> Result<TreeNode, NodeServiceError> {
        self.run_with_retry("append_next_sibling", page_id, max_retries, || {
            self.service
                .append_next_sibling(target_id, document_id, page_id)
        })
        .await
    }

    /// [`NodeService::remove_subtree`] with retry
    pub async fn remove_subtree(
        &self,
        node_id: &str,
        max_retries: usize,
    ) -> Result<usize, NodeServiceError> {
        self.run_with_retry("remove_subtree", node_id, max_retries, || {
            self.service.remove_subtree(node_id)
        })
        .await
    }

    /// Run `operation` until it succeeds, fails with a non-conflict error, or
    /// `max_retries` retries are spent (0 = single attempt)
    async fn run_with_retry<T, F, Fut>(
        &self,
        label: &str,
        node_id: &str,
        max_retries: usize,
        mut operation: F,
    ) -> Result<T, NodeServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NodeServiceError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            "{} for '{}' succeeded after {} retries",
                            label,
                            node_id,
                            attempt
                        );
                    }
                    return Ok(value);
                }

                Err(NodeServiceError::VersionConflict {
                    node_id: ref conflict_node_id,
                    expected_version,
                    actual_version,
                }) if attempt < max_retries => {
                    tracing::debug!(
                        "Version conflict on attempt {}/{} of {} for '{}': node '{}' expected v{}, got v{}. Retrying...",
                        attempt + 1,
                        max_retries + 1,
                        label,
                        node_id,
                        conflict_node_id,
                        expected_version,
                        actual_version
                    );

                    // 10ms, 20ms, 40ms, 80ms, ... capped at 640ms
                    let backoff_ms = BASE_BACKOFF_MS << attempt.min(6);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;

                    attempt += 1;
                }

                Err(e) => {
                    if e.is_version_conflict() {
                        tracing::warn!(
                            "Max retries ({}) exceeded for {} on '{}'",
                            max_retries,
                            label,
                            node_id
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseError, MemoryStore, NodeStore};
    use crate::models::{BulkWriteResult, DeleteResult, TreeNodeUpdate, VersionedUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that bumps a node's version behind the caller's back on the
    /// first `interference` conditional writes
    struct InterferingStore {
        inner: MemoryStore,
        interference: AtomicUsize,
    }

    impl InterferingStore {
        fn new(interference: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                interference: AtomicUsize::new(interference),
            }
        }
    }

    #[async_trait]
    impl NodeStore for InterferingStore {
        async fn create_node(&self, node: TreeNode) -> Result<TreeNode, DatabaseError> {
            self.inner.create_node(node).await
        }

        async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, DatabaseError> {
            self.inner.get_node(id).await
        }

        async fn get_nodes_by_document(
            &self,
            document_id: &str,
        ) -> Result<Vec<TreeNode>, DatabaseError> {
            self.inner.get_nodes_by_document(document_id).await
        }

        async fn update_with_version_check(
            &self,
            id: &str,
            expected_version: i64,
            update: TreeNodeUpdate,
        ) -> Result<Option<TreeNode>, DatabaseError> {
            let remaining = self.interference.load(Ordering::SeqCst);
            if remaining > 0 {
                self.interference.store(remaining - 1, Ordering::SeqCst);
                // Another writer touches the node first
                self.inner
                    .update_with_version_check(id, expected_version, TreeNodeUpdate::new())
                    .await?;
            }
            self.inner
                .update_with_version_check(id, expected_version, update)
                .await
        }

        async fn bulk_update_with_version_check(
            &self,
            updates: Vec<VersionedUpdate>,
        ) -> Result<BulkWriteResult, DatabaseError> {
            self.inner.bulk_update_with_version_check(updates).await
        }

        async fn delete_node(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
            self.inner.delete_node(id).await
        }

        async fn delete_with_version_check(
            &self,
            id: &str,
            expected_version: i64,
        ) -> Result<bool, DatabaseError> {
            self.inner.delete_with_version_check(id, expected_version).await
        }

        async fn close(&self) -> Result<(), DatabaseError> {
            self.inner.close().await
        }
    }

    async fn setup(interference: usize) -> ConflictRetryQueue {
        let store = Arc::new(InterferingStore::new(interference));
        let service = Arc::new(NodeService::new(store));
        service.register_document_node("D1").await.unwrap();
        ConflictRetryQueue::new(service)
    }

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let queue = setup(0).await;
        let node = queue.insert_first_in_document("D1", "P1", 3).await.unwrap();
        assert_eq!(node.parent_id, "D1");
    }

    #[tokio::test]
    async fn test_retries_through_version_conflicts() {
        let queue = setup(2).await;
        let node = queue.insert_first_in_document("D1", "P1", 3).await.unwrap();
        assert_eq!(node.id, "P1");

        let root = queue.service().get_node("D1").await.unwrap().unwrap();
        assert_eq!(root.children, vec!["P1".to_string()]);
        // register (1) + two interfering bumps + the successful write
        assert_eq!(root.version, 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let queue = setup(5).await;
        let result = queue.insert_first_in_document("D1", "P1", 1).await;
        assert!(matches!(
            result,
            Err(NodeServiceError::VersionConflict { .. })
        ));
        assert!(queue.service().get_node("P1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let queue = setup(1).await;
        let result = queue.insert_first_in_document("D1", "P1", 0).await;
        assert!(result.unwrap_err().is_version_conflict());

        // The interference is spent, so a fresh call goes through
        queue.insert_first_in_document("D1", "P1", 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_conflict_errors_are_not_retried() {
        let queue = setup(0).await;
        let result = queue.insert_first_child("MISSING", "D1", "P1", 5).await;
        assert!(matches!(result, Err(NodeServiceError::NodeNotFound { .. })));
    }

    #[tokio::test]
    async fn test_sibling_and_subtree_removal_with_retry() {
        let queue = setup(0).await;
        queue.insert_first_in_document("D1", "P1", 0).await.unwrap();
        queue
            .append_next_sibling("P1", "D1", "P2", 2)
            .await
            .unwrap();
        queue.insert_first_child("P2", "D1", "P3", 2).await.unwrap();

        let removed = queue.remove_subtree("P2", 2).await.unwrap();
        assert_eq!(removed, 2);

        let root = queue.service().get_node("D1").await.unwrap().unwrap();
        assert_eq!(root.children, vec!["P1".to_string()]);
    }
}
