//! Tree Events
//!
//! Notifications emitted by `NodeService` after a tree change has been
//! persisted. Events use tokio's broadcast channel, so any number of
//! subscribers receive them without coupling to the service.
//!
//! Events are emitted only after the store accepted the write. A failed
//! reconciliation emits nothing, even when some bulk entries were committed.

use crate::models::TreeNode;
use serde::{Deserialize, Serialize};

/// Tree-level change notifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum TreeEvent {
    /// A node record was created and linked into its parent
    #[serde(rename = "node:attached")]
    NodeAttached {
        node: TreeNode,
        parent: TreeNode,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_client_id: Option<String>,
    },

    /// A node record was removed
    #[serde(rename = "node:detached")]
    NodeDetached {
        node_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_client_id: Option<String>,
    },

    /// A whole document tree was replaced
    #[serde(rename = "tree:reconciled")]
    TreeReconciled {
        document_id: String,
        node_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_client_id: Option<String>,
    },
}

impl TreeEvent {
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeAttached { .. } => "node:attached",
            TreeEvent::NodeDetached { .. } => "node:detached",
            TreeEvent::TreeReconciled { .. } => "tree:reconciled",
        }
    }
}
