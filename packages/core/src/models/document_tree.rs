//! Nested Document Tree Shapes
//!
//! Clients see a document's page tree as nested entries rooted implicitly at the
//! document. The same shape is returned by `NodeService::get_document_tree` and
//! accepted by `NodeService::update_document_tree`, so a client can fetch, edit
//! and resubmit without any conversion.

use serde::{Deserialize, Serialize};

/// One page of a nested document tree, with its own subtree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageTreeEntry {
    pub page_id: String,

    /// Version the client last read for this page's node
    pub version: i64,

    /// Ordered child pages
    #[serde(default, alias = "nodes")]
    pub children: Vec<PageTreeEntry>,
}

impl PageTreeEntry {
    /// Leaf entry without children
    pub fn leaf(page_id: impl Into<String>, version: i64) -> Self {
        Self {
            page_id: page_id.into(),
            version,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<PageTreeEntry>) -> Self {
        self.children = children;
        self
    }

    /// Number of entries in this subtree, including `self`
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(PageTreeEntry::subtree_len)
            .sum::<usize>()
    }
}

/// Full-tree replacement request for one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTreeUpdate {
    pub document_id: String,

    /// Version of the root node the client last read; checked when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_version: Option<i64>,

    /// Top-level pages in display order
    #[serde(default, alias = "nodes")]
    pub pages: Vec<PageTreeEntry>,
}

impl DocumentTreeUpdate {
    pub fn new(document_id: impl Into<String>, pages: Vec<PageTreeEntry>) -> Self {
        Self {
            document_id: document_id.into(),
            root_version: None,
            pages,
        }
    }

    pub fn with_root_version(mut self, version: i64) -> Self {
        self.root_version = Some(version);
        self
    }
}

/// Nested view of a document's stored page tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTree {
    pub document_id: String,

    /// Current version of the document's root node
    pub root_version: i64,

    pub pages: Vec<PageTreeEntry>,
}

impl DocumentTree {
    /// Number of page entries (the root is not counted)
    pub fn page_count(&self) -> usize {
        self.pages.iter().map(PageTreeEntry::subtree_len).sum()
    }

    /// Turn the view into a resubmittable update pinned to the read root version
    pub fn into_update(self) -> DocumentTreeUpdate {
        DocumentTreeUpdate {
            document_id: self.document_id,
            root_version: Some(self.root_version),
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtree_len_counts_all_levels() {
        let entry = PageTreeEntry::leaf("p1", 1).with_children(vec![
            PageTreeEntry::leaf("p2", 1)
                .with_children(vec![PageTreeEntry::leaf("p3", 1)]),
            PageTreeEntry::leaf("p4", 1),
        ]);
        assert_eq!(entry.subtree_len(), 4);
    }

    #[test]
    fn test_update_accepts_nodes_alias() {
        let json = r#"{
            "documentId": "doc-1",
            "nodes": [
                { "pageId": "p1", "version": 2, "nodes": [ { "pageId": "p2", "version": 1 } ] }
            ]
        }"#;
        let update: DocumentTreeUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.document_id, "doc-1");
        assert_eq!(update.root_version, None);
        assert_eq!(update.pages.len(), 1);
        assert_eq!(update.pages[0].children[0].page_id, "p2");
    }

    #[test]
    fn test_into_update_pins_root_version() {
        let tree = DocumentTree {
            document_id: "doc-1".to_string(),
            root_version: 7,
            pages: vec![PageTreeEntry::leaf("p1", 1)],
        };
        assert_eq!(tree.page_count(), 1);

        let update = tree.into_update();
        assert_eq!(update.root_version, Some(7));
        assert_eq!(update.pages.len(), 1);
    }
}
