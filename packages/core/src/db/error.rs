//! Database Error Types
//!
//! This module defines error types for node store operations, providing
//! clear error handling for connection, initialization, and query failures.
//!
//! Version conflicts are not errors at this layer: a stale conditional write is a
//! normal outcome reported through return values, never an error.

use std::path::PathBuf;
use thiserror::Error;

/// Node store operation errors
///
/// Covers all error cases for store connection, initialization, and basic
/// record operations. Business rule failures are handled by
/// [`crate::services::NodeServiceError`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A record with this id already exists
    #[error("Duplicate key: node {id} already exists")]
    DuplicateKey { id: String },

    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {reason}")]
    ConnectionFailed { path: PathBuf, reason: String },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Invalid database path provided
    #[error("Invalid database path: {path}")]
    InvalidPath { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// Query execution error with context
    #[error("Query failed: {context}")]
    QueryFailed { context: String },

    /// The store was closed and no longer accepts operations
    #[error("Store is closed")]
    Closed,

    /// SurrealDB operation error
    #[cfg(feature = "surrealdb")]
    #[error("SurrealDB operation failed: {0}")]
    Surreal(#[from] surrealdb::Error),
}

impl DatabaseError {
    /// Create a duplicate key error
    pub fn duplicate_key(id: impl Into<String>) -> Self {
        Self::DuplicateKey { id: id.into() }
    }

    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            path,
            reason: reason.into(),
        }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf) -> Self {
        Self::InvalidPath { path }
    }

    /// Create a query failed error with context
    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryFailed {
            context: context.into(),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
