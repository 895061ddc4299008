//! Docnode Core - Page Tree Consistency Engine
//!
//! This crate keeps the page hierarchy of wiki documents consistent on top of a
//! versioned node store. Each page (and each document's root) is one record
//! holding its parent id, its ordered children ids and a version token.
//!
//! # Architecture
//!
//! - **Optimistic concurrency**: every write is conditioned on the version the
//!   caller read; a mismatch is reported, never silently overwritten
//! - **Two write paths**: point mutations touch at most two records, full-tree
//!   reconciliation replaces a whole document tree in one bulk write
//! - **Pluggable storage**: in-memory store by default, embedded SurrealDB behind
//!   the `surrealdb` feature
//!
//! # Modules
//!
//! - [`models`] - Node records, update payloads, nested tree shapes
//! - [`db`] - `NodeStore` trait and its backends
//! - [`tree`] - Snapshot builder, reconciler, tree view, integrity checks
//! - [`services`] - `NodeService` and its error taxonomy
//! - [`operations`] - Retry layer for point mutations
//! - [`config`] - Store selection from the environment

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use config::{StoreBackend, StoreConfig};
pub use models::*;
pub use services::*;
