//! Data Models
//!
//! This module contains the data structures of the page-tree engine:
//!
//! - `TreeNode` - Flat storage record for one node of a document tree
//! - `TreeNodeUpdate` / `VersionedUpdate` - Sparse, version-checked writes
//! - `PageTreeEntry` / `DocumentTree` - Nested client-facing tree shapes

mod document_tree;
mod tree_node;

pub use document_tree::{DocumentTree, DocumentTreeUpdate, PageTreeEntry};
pub use tree_node::{
    BulkWriteResult, DeleteResult, TreeNode, TreeNodeUpdate, VersionedUpdate, INITIAL_VERSION,
};
