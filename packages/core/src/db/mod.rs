//! Database Layer
//!
//! This module handles all persistence of tree nodes:
//!
//! - The `NodeStore` trait (point reads, conditional writes, bulk writes)
//! - `MemoryStore`, the default in-process backend
//! - `SurrealStore`, the embedded SurrealDB backend (`surrealdb` feature)
//! - The process-wide shared store handle
//! - Tree events emitted after successful writes
//!
//! All coordination between concurrent writers happens through per-record
//! version tokens. No backend takes locks that outlive a single call.

mod error;
pub mod events;
mod handle;
mod memory_store;
mod node_store;
#[cfg(feature = "surrealdb")]
mod surreal_store;

pub use error::DatabaseError;
pub use events::TreeEvent;
pub use handle::{open_store, shared_store};
pub use memory_store::MemoryStore;
pub use node_store::NodeStore;
#[cfg(feature = "surrealdb")]
pub use surreal_store::{SurrealStore, DEFAULT_DATABASE, DEFAULT_NAMESPACE};
