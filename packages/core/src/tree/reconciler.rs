//! Tree Reconciler
//!
//! Replaces the whole stored structure of a document with a client-submitted
//! tree in one bulk conditional write.
//!
//! # Algorithm
//!
//! 1. Flatten the submission ([`TreeSnapshot::build`]); malformed trees are
//!    rejected before any store access
//! 2. Load every stored node of the document
//! 3. Cardinality: stored count must equal submitted count + 1 (the root)
//! 4. Recompute parent/children of every stored node from the submission;
//!    a stored node absent from the submission is an unknown node
//! 5. Check every submitted version against the loaded one
//! 6. Submit one bulk write conditioned on the loaded versions and require
//!    every entry to apply
//!
//! Steps 1–5 never write. Drift is detected by node count only: a tree whose
//! pages were moved between parents but whose size is unchanged is accepted.
//!
//! # Consistency Gap
//!
//! The store has no multi-record transactions. When a concurrent writer bumps
//! a node between step 2 and step 6, the entries written before it stay
//! committed and the reconciliation fails with `PartialApply`. A store error
//! after some entries were committed is reported the same way. The document
//! may then violate the tree invariants until an operator repairs it.

use crate::db::NodeStore;
use crate::models::{DocumentTreeUpdate, TreeNode, TreeNodeUpdate, VersionedUpdate};
use crate::services::NodeServiceError;
use crate::tree::TreeSnapshot;
use std::sync::Arc;

/// Summary of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub document_id: String,
    /// Number of node records rewritten (root included)
    pub nodes_written: usize,
}

/// Validated write set for one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub document_id: String,
    /// Root entry first, then pages in depth-first submission order
    pub updates: Vec<VersionedUpdate>,
}

/// Compute the write set for `snapshot` against the loaded `stored` nodes
///
/// Pure function: it only validates and plans, it never writes.
pub fn plan_reconciliation(
    snapshot: &TreeSnapshot,
    stored: &[TreeNode],
) -> Result<ReconcilePlan, NodeServiceError> {
    let document_id = snapshot.document_id();

    let expected = snapshot.len() + 1;
    if stored.len() != expected {
        return Err(NodeServiceError::structural_drift(
            document_id,
            expected,
            stored.len(),
        ));
    }

    let root = stored
        .iter()
        .find(|node| node.id == document_id)
        .ok_or_else(|| NodeServiceError::node_not_found(document_id))?;

    if let Some(root_version) = snapshot.root_version() {
        if root_version != root.version {
            return Err(NodeServiceError::version_conflict(
                &root.id,
                root_version,
                root.version,
            ));
        }
    }

    let mut updates = Vec::with_capacity(stored.len());
    updates.push(VersionedUpdate::new(
        &root.id,
        root.version,
        TreeNodeUpdate::new()
            .with_document_id(document_id)
            .with_parent_id(document_id)
            .with_children(snapshot.root_children().to_vec()),
    ));

    // Every stored page must be claimed by the submission. With equal counts
    // and no duplicates this makes stored pages and submitted pages the same set.
    for node in stored.iter().filter(|node| node.id != document_id) {
        let desired = snapshot
            .get(&node.id)
            .ok_or_else(|| NodeServiceError::unknown_node(&node.id, document_id))?;
        if desired.expected_version != node.version {
            return Err(NodeServiceError::version_conflict(
                &node.id,
                desired.expected_version,
                node.version,
            ));
        }
    }

    let loaded_versions: std::collections::HashMap<&str, i64> = stored
        .iter()
        .map(|node| (node.id.as_str(), node.version))
        .collect();

    for (page_id, desired) in snapshot.iter() {
        let version = loaded_versions
            .get(page_id)
            .copied()
            .ok_or_else(|| NodeServiceError::node_not_found(page_id))?;
        updates.push(VersionedUpdate::new(
            page_id,
            version,
            TreeNodeUpdate::new()
                .with_document_id(document_id)
                .with_parent_id(&desired.parent_id)
                .with_children(desired.children.clone()),
        ));
    }

    Ok(ReconcilePlan {
        document_id: document_id.to_string(),
        updates,
    })
}

/// Full-tree reconciliation against a node store
pub struct TreeReconciler {
    store: Arc<dyn NodeStore>,
}

impl TreeReconciler {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Replace the stored structure of `update.document_id` with `update`
    ///
    /// # Errors
    ///
    /// - `MalformedTree` - duplicated, empty or root-colliding page ids
    /// - `StructuralDrift` - stored node count differs from the submission
    /// - `UnknownNode` - a stored node is missing from the submission
    /// - `NodeNotFound` - the document has no root record
    /// - `VersionConflict` - a submitted version differs from the stored one
    /// - `PartialApply` - some bulk entries were committed, others were not
    pub async fn reconcile(
        &self,
        update: &DocumentTreeUpdate,
    ) -> Result<ReconcileOutcome, NodeServiceError> {
        let snapshot = TreeSnapshot::build(update)?;

        let stored = self
            .store
            .get_nodes_by_document(snapshot.document_id())
            .await?;

        let plan = plan_reconciliation(&snapshot, &stored)?;
        let attempted = plan.updates.len();

        tracing::debug!(
            "Reconciling document {}: {} node writes",
            plan.document_id,
            attempted
        );

        let result = self
            .store
            .bulk_update_with_version_check(plan.updates)
            .await?;

        if result.applied_count() != attempted {
            let unapplied = result.unapplied();
            tracing::error!(
                "Partial apply in document {}: {} of {} writes committed, not written {:?} ({} lost to store errors)",
                plan.document_id,
                result.applied_count(),
                attempted,
                unapplied,
                result.failed.len()
            );
            return Err(NodeServiceError::PartialApply {
                document_id: plan.document_id,
                applied: result.applied_count(),
                attempted,
                skipped_node_ids: unapplied,
            });
        }

        tracing::info!(
            "Reconciled document {} ({} nodes)",
            plan.document_id,
            attempted
        );

        Ok(ReconcileOutcome {
            document_id: plan.document_id,
            nodes_written: attempted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageTreeEntry;

    fn node(id: &str, parent: &str, children: &[&str], version: i64) -> TreeNode {
        let mut node = TreeNode::new_child(id, "D1", parent);
        node.children = children.iter().map(|c| c.to_string()).collect();
        node.version = version;
        node
    }

    fn stored_tree() -> Vec<TreeNode> {
        let mut root = TreeNode::new_root("D1");
        root.children = vec!["P1".to_string()];
        root.version = 3;
        vec![
            root,
            node("P1", "D1", &["P2", "P3"], 2),
            node("P2", "P1", &[], 1),
            node("P3", "P1", &[], 1),
        ]
    }

    #[test]
    fn test_plan_orders_root_first_then_depth_first() {
        let update = DocumentTreeUpdate::new(
            "D1",
            vec![
                PageTreeEntry::leaf("P1", 2).with_children(vec![PageTreeEntry::leaf("P3", 1)]),
                PageTreeEntry::leaf("P2", 1),
            ],
        );
        let snapshot = TreeSnapshot::build(&update).unwrap();
        let plan = plan_reconciliation(&snapshot, &stored_tree()).unwrap();

        let ids: Vec<&str> = plan.updates.iter().map(|u| u.node_id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "P1", "P3", "P2"]);

        let root = &plan.updates[0];
        assert_eq!(root.expected_version, 3);
        assert_eq!(
            root.update.children,
            Some(vec!["P1".to_string(), "P2".to_string()])
        );

        let p2 = &plan.updates[3];
        assert_eq!(p2.update.parent_id.as_deref(), Some("D1"));
        assert_eq!(p2.expected_version, 1);
    }

    #[test]
    fn test_plan_rejects_count_mismatch() {
        let update = DocumentTreeUpdate::new("D1", vec![PageTreeEntry::leaf("P1", 2)]);
        let snapshot = TreeSnapshot::build(&update).unwrap();
        let err = plan_reconciliation(&snapshot, &stored_tree()).unwrap_err();
        assert!(matches!(
            err,
            NodeServiceError::StructuralDrift {
                expected: 2,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_rejects_unknown_stored_node() {
        let update = DocumentTreeUpdate::new(
            "D1",
            vec![
                PageTreeEntry::leaf("P1", 2),
                PageTreeEntry::leaf("P2", 1),
                PageTreeEntry::leaf("P9", 1),
            ],
        );
        let snapshot = TreeSnapshot::build(&update).unwrap();
        let err = plan_reconciliation(&snapshot, &stored_tree()).unwrap_err();
        assert!(matches!(err, NodeServiceError::UnknownNode { ref node_id, .. } if node_id == "P3"));
    }

    #[test]
    fn test_plan_rejects_stale_page_version() {
        let update = DocumentTreeUpdate::new(
            "D1",
            vec![PageTreeEntry::leaf("P1", 1)
                .with_children(vec![PageTreeEntry::leaf("P2", 1), PageTreeEntry::leaf("P3", 1)])],
        );
        let snapshot = TreeSnapshot::build(&update).unwrap();
        let err = plan_reconciliation(&snapshot, &stored_tree()).unwrap_err();
        assert!(matches!(
            err,
            NodeServiceError::VersionConflict {
                ref node_id,
                expected_version: 1,
                actual_version: 2,
            } if node_id == "P1"
        ));
    }

    #[test]
    fn test_plan_checks_root_version_when_given() {
        let update = DocumentTreeUpdate::new(
            "D1",
            vec![PageTreeEntry::leaf("P1", 2)
                .with_children(vec![PageTreeEntry::leaf("P2", 1), PageTreeEntry::leaf("P3", 1)])],
        )
        .with_root_version(2);
        let snapshot = TreeSnapshot::build(&update).unwrap();
        let err = plan_reconciliation(&snapshot, &stored_tree()).unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[test]
    fn test_plan_requires_root_record() {
        let stored = vec![node("P1", "D1", &[], 1), node("P2", "D1", &[], 1)];
        let update = DocumentTreeUpdate::new("D1", vec![PageTreeEntry::leaf("P1", 1)]);
        let snapshot = TreeSnapshot::build(&update).unwrap();
        assert!(matches!(
            plan_reconciliation(&snapshot, &stored),
            Err(NodeServiceError::NodeNotFound { .. })
        ));
    }
}
