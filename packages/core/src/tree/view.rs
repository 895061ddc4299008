//! Nested tree view
//!
//! Rebuilds a document's nested page tree from its flat records by following
//! `children` lists from the root. The result has exactly the shape the
//! reconciler accepts, carrying each node's current version.
//!
//! Child ids without a record (left behind by a plain detach) and ids already
//! visited are skipped with a warning, so a damaged tree still renders.

use crate::models::{DocumentTree, PageTreeEntry, TreeNode};
use crate::services::NodeServiceError;
use std::collections::{HashMap, HashSet};

/// Build the nested view of `document_id` from its stored records
pub fn build_document_tree(
    document_id: &str,
    nodes: &[TreeNode],
) -> Result<DocumentTree, NodeServiceError> {
    let by_id: HashMap<&str, &TreeNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let root = by_id
        .get(document_id)
        .copied()
        .ok_or_else(|| NodeServiceError::node_not_found(document_id))?;

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(root.id.as_str());

    let pages = collect_children(root, &by_id, &mut visited);

    Ok(DocumentTree {
        document_id: document_id.to_string(),
        root_version: root.version,
        pages,
    })
}

fn collect_children<'a>(
    parent: &'a TreeNode,
    by_id: &HashMap<&'a str, &'a TreeNode>,
    visited: &mut HashSet<&'a str>,
) -> Vec<PageTreeEntry> {
    let mut entries = Vec::with_capacity(parent.children.len());
    for child_id in &parent.children {
        let Some(child) = by_id.get(child_id.as_str()).copied() else {
            tracing::warn!(
                "Skipping dangling child {} of node {} in document {}",
                child_id,
                parent.id,
                parent.document_id
            );
            continue;
        };
        if !visited.insert(child.id.as_str()) {
            tracing::warn!(
                "Skipping node {} already placed elsewhere in document {}",
                child.id,
                parent.document_id
            );
            continue;
        }
        entries.push(PageTreeEntry {
            page_id: child.id.clone(),
            version: child.version,
            children: collect_children(child, by_id, visited),
        });
    }
    entries
}
