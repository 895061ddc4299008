//! Service Layer Error Types
//!
//! This module defines error types for tree operations. Every variant is
//! terminal for the operation that raised it; nothing is retried internally.
//!
//! `PartialApply` is the only variant after which stored state may violate
//! the tree invariants. It must reach operators as its own category, never
//! folded into a generic failure.

use crate::db::DatabaseError;
use thiserror::Error;

/// What a caller should do after an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Re-read the affected nodes and submit again
    RetryWithFreshData,
    /// The client's tree view is stale; reload the whole tree before editing
    ReloadTree,
    /// Stored state may be inconsistent; manual reconciliation is required
    ContactOperator,
    /// Backend failure unrelated to the request content
    RetryLater,
}

/// Tree operation errors
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// The parent referenced by a node does not exist
    #[error("Parent node not found: {parent_id} (referenced by {child_id})")]
    ParentNotFound { parent_id: String, child_id: String },

    /// A node with this id already exists
    #[error("Duplicate key: node {id} already exists")]
    DuplicateKey { id: String },

    /// Version conflict (optimistic concurrency control)
    #[error("Version conflict for node {node_id}: expected version {expected_version}, found {actual_version}")]
    VersionConflict {
        node_id: String,
        expected_version: i64,
        actual_version: i64,
    },

    /// Submitted tree is not well formed
    #[error("Malformed tree: {reason}")]
    MalformedTree { reason: String },

    /// Stored node count disagrees with the submitted tree
    #[error("Structural drift in document {document_id}: submitted tree implies {expected} nodes, store holds {actual}")]
    StructuralDrift {
        document_id: String,
        expected: usize,
        actual: usize,
    },

    /// A stored node is missing from the submitted tree
    #[error("Unknown node {node_id}: stored in document {document_id} but absent from the submitted tree")]
    UnknownNode { node_id: String, document_id: String },

    /// A bulk write was only partially applied
    #[error("Partial apply in document {document_id}: {applied} of {attempted} node writes committed (skipped: {skipped_node_ids:?})")]
    PartialApply {
        document_id: String,
        applied: usize,
        attempted: usize,
        skipped_node_ids: Vec<String>,
    },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[source] DatabaseError),
}

impl From<DatabaseError> for NodeServiceError {
    fn from(err: DatabaseError) -> Self {
        Self::from_store(err)
    }
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a parent not found error
    pub fn parent_not_found(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    /// Create a duplicate key error
    pub fn duplicate_key(id: impl Into<String>) -> Self {
        Self::DuplicateKey { id: id.into() }
    }

    /// Create a version conflict error
    pub fn version_conflict(
        node_id: impl Into<String>,
        expected_version: i64,
        actual_version: i64,
    ) -> Self {
        Self::VersionConflict {
            node_id: node_id.into(),
            expected_version,
            actual_version,
        }
    }

    /// Create a malformed tree error
    pub fn malformed_tree(reason: impl Into<String>) -> Self {
        Self::MalformedTree {
            reason: reason.into(),
        }
    }

    /// Create a structural drift error
    pub fn structural_drift(document_id: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::StructuralDrift {
            document_id: document_id.into(),
            expected,
            actual,
        }
    }

    /// Create an unknown node error
    pub fn unknown_node(node_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::UnknownNode {
            node_id: node_id.into(),
            document_id: document_id.into(),
        }
    }

    /// Lift store errors, keeping duplicate keys in the service taxonomy
    pub fn from_store(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateKey { id } => Self::DuplicateKey { id },
            other => Self::Database(other),
        }
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// True when stored state may have been left inconsistent
    pub fn is_partial_apply(&self) -> bool {
        matches!(self, Self::PartialApply { .. })
    }

    /// Classify the error for user-facing reporting
    pub fn user_action(&self) -> UserAction {
        match self {
            Self::NodeNotFound { .. }
            | Self::ParentNotFound { .. }
            | Self::DuplicateKey { .. }
            | Self::VersionConflict { .. } => UserAction::RetryWithFreshData,
            Self::MalformedTree { .. }
            | Self::StructuralDrift { .. }
            | Self::UnknownNode { .. } => UserAction::ReloadTree,
            Self::PartialApply { .. } => UserAction::ContactOperator,
            Self::Database(_) => UserAction::RetryLater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_message() {
        let err = NodeServiceError::version_conflict("p1", 3, 4);
        assert_eq!(
            err.to_string(),
            "Version conflict for node p1: expected version 3, found 4"
        );
        assert!(err.is_version_conflict());
        assert_eq!(err.user_action(), UserAction::RetryWithFreshData);
    }

    #[test]
    fn test_drift_asks_for_reload() {
        let err = NodeServiceError::structural_drift("doc-1", 4, 5);
        assert_eq!(err.user_action(), UserAction::ReloadTree);
        assert!(err.to_string().contains("implies 4 nodes, store holds 5"));
    }

    #[test]
    fn test_partial_apply_is_distinct() {
        let err = NodeServiceError::PartialApply {
            document_id: "doc-1".to_string(),
            applied: 2,
            attempted: 3,
            skipped_node_ids: vec!["p2".to_string()],
        };
        assert!(err.is_partial_apply());
        assert_eq!(err.user_action(), UserAction::ContactOperator);
        assert!(!NodeServiceError::malformed_tree("dup").is_partial_apply());
    }

    #[test]
    fn test_from_store_maps_duplicate_key() {
        let err = NodeServiceError::from_store(DatabaseError::duplicate_key("p1"));
        assert!(matches!(err, NodeServiceError::DuplicateKey { ref id } if id == "p1"));

        let err = NodeServiceError::from_store(DatabaseError::Closed);
        assert_eq!(err.user_action(), UserAction::RetryLater);
    }
}
