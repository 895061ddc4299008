//! Business Services
//!
//! - `NodeService` - page tree mutations, full-tree reconciliation, tree views
//!
//! Services coordinate between the database layer and the tree engine,
//! enforcing the tree invariants on every write path.

pub mod error;
pub mod node_service;

pub use error::{NodeServiceError, UserAction};
pub use node_service::NodeService;
