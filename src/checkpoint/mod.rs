//! Checkpoint module for resumable runs
//!
//! This module persists the mapping from item identity to its completed
//! payload, including:
//! - Loading a previous checkpoint once at startup
//! - Skipping identities that already have an entry
//! - Periodic, all-or-nothing rewrites of the checkpoint file

mod store;

pub use store::{load_entries, CheckpointStore};

use thiserror::Error;

/// Errors that can occur while persisting a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to replace checkpoint {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;
