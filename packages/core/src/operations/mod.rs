//! Operations layered over [`crate::services::NodeService`]
//!
//! - [`ConflictRetryQueue`] - replays point mutations that lost a version check

pub mod retry;

pub use retry::ConflictRetryQueue;
