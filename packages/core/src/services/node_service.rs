//! Node Service - Page Tree Operations
//!
//! `NodeService` is the entry point for every change to a document's page
//! tree. It offers two kinds of operations:
//!
//! - **Point mutations** - attach a page as the document's first page, as a
//!   node's first child, or as a node's next sibling; detach a page. Each reads
//!   at most two records and writes the parent under a version check before
//!   creating the child record.
//! - **Full-tree replacement** - [`NodeService::update_document_tree`] delegates
//!   to the [`TreeReconciler`].
//!
//! Store calls are awaited one after another; there is no parallel fan-out of
//! writes. Version conflicts are reported, never retried here (see
//! [`crate::operations::ConflictRetryQueue`] for an opt-in retry layer).

use crate::db::{DatabaseError, NodeStore, TreeEvent};
use crate::models::{
    DeleteResult, DocumentTree, DocumentTreeUpdate, TreeNode, TreeNodeUpdate,
};
use crate::services::NodeServiceError;
use crate::tree::{
    build_document_tree, check_document_tree, IntegrityReport, ReconcileOutcome, TreeReconciler,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the tree event channel
const TREE_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Where a new page goes in its parent's children list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertPosition {
    First,
    Last,
}

/// Page tree operations over a [`NodeStore`]
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,

    /// Broadcast channel for tree events
    event_tx: broadcast::Sender<TreeEvent>,

    /// Optional client identifier stamped on emitted events
    ///
    /// Use `with_client()` to create a scoped service.
    client_id: Option<String>,
}

impl NodeService {
    /// Create a new NodeService over `store`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use docnode_core::db::MemoryStore;
    /// use docnode_core::services::NodeService;
    /// use std::sync::Arc;
    ///
    /// let service = NodeService::new(Arc::new(MemoryStore::new()));
    /// let scoped = service.with_client("editor-tab-1");
    /// ```
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        let (event_tx, _) = broadcast::channel(TREE_EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            event_tx,
            client_id: None,
        }
    }

    /// Get access to the underlying store
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Clone of this service whose events carry `client_id` as their source
    pub fn with_client(&self, client_id: impl Into<String>) -> Self {
        let mut cloned = self.clone();
        cloned.client_id = Some(client_id.into());
        cloned
    }

    /// Subscribe to tree events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscribers is normal.
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<TreeNode>, NodeServiceError> {
        Ok(self.store.get_node(id).await?)
    }

    /// Create the root record of a new document
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if the document already has a root.
    pub async fn register_document_node(
        &self,
        document_id: &str,
    ) -> Result<TreeNode, NodeServiceError> {
        let root = self.store.create_node(TreeNode::new_root(document_id)).await?;
        tracing::info!("Registered root node for document {}", document_id);
        Ok(root)
    }

    /// Attach `page_id` as the first top-level page of `document_id`
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` - the document has no root record
    /// - `DuplicateKey` - `page_id` already has a node
    /// - `VersionConflict` - the root changed between read and write
    pub async fn insert_first_in_document(
        &self,
        document_id: &str,
        page_id: &str,
    ) -> Result<TreeNode, NodeServiceError> {
        let root = self
            .store
            .get_node(document_id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(document_id))?;

        self.attach_child(root, document_id, page_id, InsertPosition::First)
            .await
    }

    /// Attach `page_id` as the first child of `target_id`
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` - the target has no record
    /// - `MalformedTree` - the target belongs to another document
    /// - `DuplicateKey` - `page_id` already has a node
    /// - `VersionConflict` - the target changed between read and write
    pub async fn insert_first_child(
        &self,
        target_id: &str,
        document_id: &str,
        page_id: &str,
    ) -> Result<TreeNode, NodeServiceError> {
        let target = self
            .store
            .get_node(target_id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(target_id))?;

        self.attach_child(target, document_id, page_id, InsertPosition::First)
            .await
    }

    /// Attach `page_id` as a sibling of `target_id`
    ///
    /// The page is appended at the end of the target's parent's children, not
    /// directly after the target.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` - the target has no record
    /// - `ParentNotFound` - the target's parent has no record
    /// - `MalformedTree` - the target is a document root (roots have no siblings)
    /// - `DuplicateKey` - `page_id` already has a node
    /// - `VersionConflict` - the parent changed between read and write
    pub async fn append_next_sibling(
        &self,
        target_id: &str,
        document_id: &str,
        page_id: &str,
    ) -> Result<TreeNode, NodeServiceError> {
        let target = self
            .store
            .get_node(target_id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(target_id))?;

        if target.parent_id == target.id {
            return Err(NodeServiceError::malformed_tree(format!(
                "root node {} has no siblings",
                target.id
            )));
        }

        let parent = self
            .store
            .get_node(&target.parent_id)
            .await?
            .ok_or_else(|| NodeServiceError::parent_not_found(&target.parent_id, &target.id))?;

        self.attach_child(parent, document_id, page_id, InsertPosition::Last)
            .await
    }

    /// Parent write first, child insert second; the insert is skipped when the
    /// parent's version check fails.
    async fn attach_child(
        &self,
        parent: TreeNode,
        document_id: &str,
        page_id: &str,
        position: InsertPosition,
    ) -> Result<TreeNode, NodeServiceError> {
        if parent.document_id != document_id {
            return Err(NodeServiceError::malformed_tree(format!(
                "node {} belongs to document {}, not {}",
                parent.id, parent.document_id, document_id
            )));
        }

        // Checked before the parent write; a create that still collides is
        // undone by unlink_after_failed_create
        if self.store.get_node(page_id).await?.is_some() {
            return Err(NodeServiceError::duplicate_key(page_id));
        }

        let mut children = parent.children.clone();
        match position {
            InsertPosition::First => children.insert(0, page_id.to_string()),
            InsertPosition::Last => children.push(page_id.to_string()),
        }

        let updated_parent = self
            .store
            .update_with_version_check(
                &parent.id,
                parent.version,
                TreeNodeUpdate::new().with_children(children),
            )
            .await?;

        let Some(updated_parent) = updated_parent else {
            return Err(self.conflict_for(&parent.id, parent.version).await);
        };

        let node = match self
            .store
            .create_node(TreeNode::new_child(page_id, document_id, &parent.id))
            .await
        {
            Ok(node) => node,
            Err(e) => return Err(self.unlink_after_failed_create(&updated_parent, page_id, e).await),
        };

        tracing::info!(
            "Attached page {} under {} in document {} ({:?})",
            node.id,
            updated_parent.id,
            document_id,
            position
        );

        self.emit_event(TreeEvent::NodeAttached {
            node: node.clone(),
            parent: updated_parent,
            source_client_id: self.client_id.clone(),
        });

        Ok(node)
    }

    /// Take `page_id` back out of `parent` after its record could not be created
    ///
    /// Another writer may have created `page_id` between the duplicate check and
    /// the insert. When the parent is restored the create error is returned
    /// unchanged. When the parent moved on again, the dangling id stays and the
    /// failure is reported as `PartialApply`.
    async fn unlink_after_failed_create(
        &self,
        parent: &TreeNode,
        page_id: &str,
        create_error: DatabaseError,
    ) -> NodeServiceError {
        let children: Vec<String> = parent
            .children
            .iter()
            .filter(|id| *id != page_id)
            .cloned()
            .collect();

        let restored = self
            .store
            .update_with_version_check(
                &parent.id,
                parent.version,
                TreeNodeUpdate::new().with_children(children),
            )
            .await;

        match restored {
            Ok(Some(_)) => {
                tracing::warn!(
                    "Creating page {} failed after linking it under {}; parent restored: {}",
                    page_id,
                    parent.id,
                    create_error
                );
                NodeServiceError::from(create_error)
            }
            Ok(None) | Err(_) => {
                tracing::error!(
                    "Creating page {} failed and parent {} could not be restored; {} is listed without its record: {}",
                    page_id,
                    parent.id,
                    page_id,
                    create_error
                );
                NodeServiceError::PartialApply {
                    document_id: parent.document_id.clone(),
                    applied: 1,
                    attempted: 2,
                    skipped_node_ids: vec![page_id.to_string()],
                }
            }
        }
    }

    /// Build the error for a failed version check on `node_id`
    async fn conflict_for(&self, node_id: &str, expected_version: i64) -> NodeServiceError {
        match self.store.get_node(node_id).await {
            Ok(Some(current)) => {
                tracing::warn!(
                    "Version conflict on node {}: expected {}, found {}",
                    node_id,
                    expected_version,
                    current.version
                );
                NodeServiceError::version_conflict(node_id, expected_version, current.version)
            }
            Ok(None) => NodeServiceError::node_not_found(node_id),
            Err(e) => NodeServiceError::from(e),
        }
    }

    /// Remove the record of `node_id`
    ///
    /// The id stays in its parent's children and descendants are left in
    /// place. Use [`NodeService::remove_subtree`] to keep the tree consistent.
    pub async fn detach_node(&self, node_id: &str) -> Result<DeleteResult, NodeServiceError> {
        let result = self.store.delete_node(node_id).await?;
        if result.existed {
            tracing::info!("Detached node {}", node_id);
            self.emit_event(TreeEvent::NodeDetached {
                node_id: node_id.to_string(),
                source_client_id: self.client_id.clone(),
            });
        }
        Ok(result)
    }

    /// Unlink `node_id` from its parent and delete it with all descendants
    ///
    /// The subtree is collected first, then the parent is updated under a
    /// version check, then descendants are deleted leaf-first. Returns the
    /// number of records removed.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` - `node_id` has no record
    /// - `MalformedTree` - `node_id` is a document root
    /// - `VersionConflict` - the parent changed between read and write
    /// - `PartialApply` - a delete failed after the unlink; the records named in
    ///   `skipped_node_ids` are still stored but no longer reachable
    pub async fn remove_subtree(&self, node_id: &str) -> Result<usize, NodeServiceError> {
        let node = self
            .store
            .get_node(node_id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(node_id))?;

        if node.is_root() {
            return Err(NodeServiceError::malformed_tree(format!(
                "root node {} cannot be removed as a subtree",
                node.id
            )));
        }

        let records = self.store.get_nodes_by_document(&node.document_id).await?;
        let by_id: HashMap<&str, &TreeNode> = records.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut doomed = Vec::new();
        collect_post_order(&node, &by_id, &mut HashSet::new(), &mut doomed);

        if let Some(parent) = self.store.get_node(&node.parent_id).await? {
            let children: Vec<String> = parent
                .children
                .iter()
                .filter(|id| *id != node_id)
                .cloned()
                .collect();
            let written = self
                .store
                .update_with_version_check(
                    &parent.id,
                    parent.version,
                    TreeNodeUpdate::new().with_children(children),
                )
                .await?;
            if written.is_none() {
                return Err(self.conflict_for(&parent.id, parent.version).await);
            }
        } else {
            tracing::warn!(
                "Parent {} of node {} is missing; removing subtree without unlinking",
                node.parent_id,
                node.id
            );
        }

        let mut removed = 0;
        for (index, id) in doomed.iter().enumerate() {
            let deleted = match self.store.delete_node(id).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        "Removing subtree {} stopped at {} after {} deletes: {}",
                        node.id,
                        id,
                        removed,
                        e
                    );
                    return Err(NodeServiceError::PartialApply {
                        document_id: node.document_id.clone(),
                        // The unlink counts as the first write
                        applied: index + 1,
                        attempted: doomed.len() + 1,
                        skipped_node_ids: doomed[index..].to_vec(),
                    });
                }
            };
            if deleted.existed {
                removed += 1;
                self.emit_event(TreeEvent::NodeDetached {
                    node_id: id.clone(),
                    source_client_id: self.client_id.clone(),
                });
            }
        }

        tracing::info!(
            "Removed subtree {} ({} records) from document {}",
            node.id,
            removed,
            node.document_id
        );
        Ok(removed)
    }

    /// Delete every record of `document_id`, root included
    pub async fn delete_document_nodes(&self, document_id: &str) -> Result<usize, NodeServiceError> {
        let records = self.store.get_nodes_by_document(document_id).await?;
        let mut removed = 0;
        for record in &records {
            if self.store.delete_node(&record.id).await?.existed {
                removed += 1;
            }
        }
        tracing::info!("Deleted {} nodes of document {}", removed, document_id);
        Ok(removed)
    }

    /// Replace the whole page tree of a document
    ///
    /// See [`TreeReconciler::reconcile`] for the checks and failure modes.
    pub async fn update_document_tree(
        &self,
        update: &DocumentTreeUpdate,
    ) -> Result<ReconcileOutcome, NodeServiceError> {
        let outcome = TreeReconciler::new(self.store.clone())
            .reconcile(update)
            .await?;

        self.emit_event(TreeEvent::TreeReconciled {
            document_id: outcome.document_id.clone(),
            node_count: outcome.nodes_written,
            source_client_id: self.client_id.clone(),
        });

        Ok(outcome)
    }

    /// Nested view of a document's tree, resubmittable to `update_document_tree`
    pub async fn get_document_tree(
        &self,
        document_id: &str,
    ) -> Result<DocumentTree, NodeServiceError> {
        let records = self.store.get_nodes_by_document(document_id).await?;
        build_document_tree(document_id, &records)
    }

    /// Check the stored records of a document against the tree invariants
    pub async fn verify_document_tree(
        &self,
        document_id: &str,
    ) -> Result<IntegrityReport, NodeServiceError> {
        let records = self.store.get_nodes_by_document(document_id).await?;
        let report = check_document_tree(document_id, &records);
        if !report.is_consistent() {
            tracing::warn!(
                "Document {} has {} integrity violations",
                document_id,
                report.violations.len()
            );
        }
        Ok(report)
    }
}

/// Ids of `node`'s subtree, children before parents
fn collect_post_order<'a>(
    node: &'a TreeNode,
    by_id: &HashMap<&str, &'a TreeNode>,
    seen: &mut HashSet<&'a str>,
    out: &mut Vec<String>,
) {
    if !seen.insert(node.id.as_str()) {
        return;
    }
    for child_id in &node.children {
        if let Some(child) = by_id.get(child_id.as_str()) {
            collect_post_order(child, by_id, seen, out);
        }
    }
    out.push(node.id.clone());
}
