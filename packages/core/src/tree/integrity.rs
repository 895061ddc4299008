//! Tree integrity checks
//!
//! Verifies the structural invariants of one document's stored records:
//!
//! - exactly one root (`id == document_id`), self-parented
//! - every record is reachable from the root through `children`
//! - every non-root id is listed by exactly one parent, and that parent
//!   matches the record's `parent_id`
//! - no record lists itself, and no record lists the root
//! - every listed child has a record
//!
//! The checker reports every violation it finds instead of stopping at the
//! first one, so operators get a full picture after a partial apply.

use crate::models::TreeNode;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IntegrityViolation {
    MissingRoot,
    RootNotSelfParented { parent_id: String },
    SelfLoop { node_id: String },
    RootListedAsChild { parent_id: String },
    DanglingChild { parent_id: String, child_id: String },
    DuplicateParentage { child_id: String, parents: Vec<String> },
    ParentMismatch { node_id: String, recorded_parent: String, listed_under: String },
    Unreachable { node_id: String },
}

/// Result of checking one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub document_id: String,
    pub node_count: usize,
    pub reachable_count: usize,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check the stored records of `document_id`
pub fn check_document_tree(document_id: &str, nodes: &[TreeNode]) -> IntegrityReport {
    let by_id: HashMap<&str, &TreeNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut violations = Vec::new();

    // child id -> every node listing it, in record order
    let mut listed_by: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        for child_id in &node.children {
            if child_id == &node.id {
                violations.push(IntegrityViolation::SelfLoop {
                    node_id: node.id.clone(),
                });
                continue;
            }
            if child_id == document_id {
                violations.push(IntegrityViolation::RootListedAsChild {
                    parent_id: node.id.clone(),
                });
                continue;
            }
            if !by_id.contains_key(child_id.as_str()) {
                violations.push(IntegrityViolation::DanglingChild {
                    parent_id: node.id.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            listed_by
                .entry(child_id.as_str())
                .or_default()
                .push(node.id.as_str());
        }
    }

    let mut listed: Vec<(&str, Vec<&str>)> = listed_by.into_iter().collect();
    listed.sort_by(|a, b| a.0.cmp(b.0));
    for (child_id, parents) in &listed {
        if parents.len() > 1 {
            violations.push(IntegrityViolation::DuplicateParentage {
                child_id: child_id.to_string(),
                parents: parents.iter().map(|p| p.to_string()).collect(),
            });
        }
        if let Some(child) = by_id.get(child_id) {
            if let Some(first) = parents.first() {
                if parents.len() == 1 && child.parent_id != *first {
                    violations.push(IntegrityViolation::ParentMismatch {
                        node_id: child.id.clone(),
                        recorded_parent: child.parent_id.clone(),
                        listed_under: first.to_string(),
                    });
                }
            }
        }
    }

    let reachable = match by_id.get(document_id) {
        Some(root) => {
            if root.parent_id != root.id {
                violations.push(IntegrityViolation::RootNotSelfParented {
                    parent_id: root.parent_id.clone(),
                });
            }
            reachable_from(root, &by_id)
        }
        None => {
            violations.push(IntegrityViolation::MissingRoot);
            HashSet::new()
        }
    };

    let mut unreachable: Vec<&str> = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !reachable.contains(id))
        .collect();
    unreachable.sort_unstable();
    if !reachable.is_empty() {
        violations.extend(unreachable.into_iter().map(|id| IntegrityViolation::Unreachable {
            node_id: id.to_string(),
        }));
    }

    IntegrityReport {
        document_id: document_id.to_string(),
        node_count: nodes.len(),
        reachable_count: reachable.len(),
        violations,
    }
}

fn reachable_from<'a>(
    root: &'a TreeNode,
    by_id: &HashMap<&'a str, &'a TreeNode>,
) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&TreeNode> = vec![root];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        for child_id in &node.children {
            if let Some(child) = by_id.get(child_id.as_str()) {
                stack.push(child);
            }
        }
    }
    seen
}
