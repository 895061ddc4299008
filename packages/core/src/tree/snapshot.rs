//! Tree Snapshot Builder
//!
//! Flattens a client-submitted nested tree into a table of desired node
//! states keyed by page id. Parents are inferred from nesting: top-level pages
//! get the document id as parent.
//!
//! Flattening is pure; it never touches the store, so a malformed submission
//! is rejected before any read or write happens.

use crate::models::{DocumentTreeUpdate, PageTreeEntry};
use crate::services::NodeServiceError;
use std::collections::HashMap;

/// Desired state of one non-root node
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredNode {
    pub parent_id: String,
    pub expected_version: i64,
    pub children: Vec<String>,
}

/// Flat view of a submitted document tree
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    document_id: String,
    root_version: Option<i64>,
    root_children: Vec<String>,
    nodes: HashMap<String, DesiredNode>,
    /// Page ids in depth-first order
    order: Vec<String>,
}

impl TreeSnapshot {
    /// Flatten `update`, rejecting duplicated, empty or root-colliding page ids
    pub fn build(update: &DocumentTreeUpdate) -> Result<Self, NodeServiceError> {
        let mut snapshot = TreeSnapshot {
            document_id: update.document_id.clone(),
            root_version: update.root_version,
            root_children: update.pages.iter().map(|p| p.page_id.clone()).collect(),
            nodes: HashMap::new(),
            order: Vec::new(),
        };

        for page in &update.pages {
            snapshot.flatten(page, &update.document_id)?;
        }

        Ok(snapshot)
    }

    fn flatten(&mut self, entry: &PageTreeEntry, parent_id: &str) -> Result<(), NodeServiceError> {
        if entry.page_id.is_empty() {
            return Err(NodeServiceError::malformed_tree(format!(
                "empty page id under {}",
                parent_id
            )));
        }
        if entry.page_id == self.document_id {
            return Err(NodeServiceError::malformed_tree(format!(
                "document root {} cannot appear inside its own tree",
                entry.page_id
            )));
        }
        if self.nodes.contains_key(&entry.page_id) {
            return Err(NodeServiceError::malformed_tree(format!(
                "page {} appears more than once",
                entry.page_id
            )));
        }

        self.nodes.insert(
            entry.page_id.clone(),
            DesiredNode {
                parent_id: parent_id.to_string(),
                expected_version: entry.version,
                children: entry.children.iter().map(|c| c.page_id.clone()).collect(),
            },
        );
        self.order.push(entry.page_id.clone());

        for child in &entry.children {
            self.flatten(child, &entry.page_id)?;
        }

        Ok(())
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn root_version(&self) -> Option<i64> {
        self.root_version
    }

    /// Top-level page ids in submitted order
    pub fn root_children(&self) -> &[String] {
        &self.root_children
    }

    pub fn get(&self, page_id: &str) -> Option<&DesiredNode> {
        self.nodes.get(page_id)
    }

    /// Number of non-root nodes in the submission
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Desired nodes in depth-first submission order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DesiredNode)> {
        self.order
            .iter()
            .filter_map(move |id| self.nodes.get(id).map(|node| (id.as_str(), node)))
    }
}
