//! Tree Node Model
//!
//! A `TreeNode` is the storage record for one page's position inside a
//! document's page tree. Every record is flat: the tree is the union of all
//! records sharing a `document_id`, linked through `children` lists.
//!
//! # Root Node
//!
//! Each document owns exactly one root record whose `id` equals the document id.
//! The root is its own parent (`parent_id == id`) and its `children` define the
//! top-level page order of the document.
//!
//! # Versioning
//!
//! `version` is the optimistic concurrency token. It starts at 1 when a record is
//! created and is incremented by the store on every successful conditional write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version assigned to a freshly created node
pub const INITIAL_VERSION: i64 = 1;

fn default_version() -> i64 {
    INITIAL_VERSION
}

/// Storage record for one node of a document's page tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Page identifier (or the document identifier for the root node)
    pub id: String,

    /// Owning document
    pub document_id: String,

    /// Parent node; equals `id` for the root node
    pub parent_id: String,

    /// Ordered child node identifiers (display order of pages)
    #[serde(default)]
    pub children: Vec<String>,

    /// Optimistic concurrency control version (incremented on each write)
    #[serde(default = "default_version")]
    pub version: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl TreeNode {
    /// Create the root record of a document
    ///
    /// The root is self-parented and starts without children.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use docnode_core::models::TreeNode;
    ///
    /// let root = TreeNode::new_root("doc-1");
    /// assert!(root.is_root());
    /// assert_eq!(root.parent_id, "doc-1");
    /// assert_eq!(root.version, 1);
    /// ```
    pub fn new_root(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let now = Utc::now();
        Self {
            id: document_id.clone(),
            parent_id: document_id.clone(),
            document_id,
            children: Vec::new(),
            version: INITIAL_VERSION,
            created_at: now,
            modified_at: now,
        }
    }

    /// Create a leaf record for a page attached under `parent_id`
    pub fn new_child(
        id: impl Into<String>,
        document_id: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            parent_id: parent_id.into(),
            children: Vec::new(),
            version: INITIAL_VERSION,
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether this record is its document's root
    pub fn is_root(&self) -> bool {
        self.id == self.document_id
    }

    /// Apply a sparse update in place (version is left to the caller)
    pub fn apply(&mut self, update: &TreeNodeUpdate) {
        if let Some(document_id) = &update.document_id {
            self.document_id = document_id.clone();
        }
        if let Some(parent_id) = &update.parent_id {
            self.parent_id = parent_id.clone();
        }
        if let Some(children) = &update.children {
            self.children = children.clone();
        }
    }
}

/// Sparse update of the structural fields of a node
///
/// Only provided fields are changed. `version` is never part of an update: the
/// store increments it as part of every successful conditional write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

impl TreeNodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.children = Some(children);
        self
    }

    /// True when the update carries no field changes
    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.parent_id.is_none() && self.children.is_none()
    }
}

/// One entry of a conditional bulk write
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedUpdate {
    pub node_id: String,
    pub expected_version: i64,
    pub update: TreeNodeUpdate,
}

impl VersionedUpdate {
    pub fn new(node_id: impl Into<String>, expected_version: i64, update: TreeNodeUpdate) -> Self {
        Self {
            node_id: node_id.into(),
            expected_version,
            update,
        }
    }
}

/// Outcome of a conditional bulk write
///
/// Entries are reported in submission order. An entry is skipped when its
/// record is missing or its stored version no longer matches. When the backend
/// errors partway through, the failing entry and every later one are listed in
/// `failed` and were never attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    /// Ids of entries that were written
    pub applied: Vec<String>,

    /// Ids of entries that failed their version check
    pub skipped: Vec<String>,

    /// Ids of entries lost to a backend error
    pub failed: Vec<String>,
}

impl BulkWriteResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn attempted_count(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.failed.len()
    }

    /// True when every submitted entry was written
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Ids of every entry that was not written, skipped before failed
    pub fn unapplied(&self) -> Vec<String> {
        self.skipped.iter().chain(&self.failed).cloned().collect()
    }
}

/// Result of a delete operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Whether the node existed before deletion
    ///
    /// - `true`: Node existed and was deleted
    /// - `false`: Node didn't exist (idempotent no-op)
    pub existed: bool,
}

impl DeleteResult {
    pub fn existed() -> Self {
        Self { existed: true }
    }

    pub fn not_found() -> Self {
        Self { existed: false }
    }
}
