//! Checkpoint storage trait and types
//!
//! This module defines the CheckpointStore trait for backend-agnostic
//! checkpoint storage operations, plus shared types.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoint identifier for storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointID {
    /// Checkpoint type (e.g., "wp-table")
    pub checkpoint_type: String,
    /// What the checkpoint belongs to (e.g., the table name)
    pub key: String,
}

impl CheckpointID {
    pub fn new(checkpoint_type: &str, key: &str) -> Self {
        Self {
            checkpoint_type: checkpoint_type.to_string(),
            key: key.to_string(),
        }
    }
}

impl std::fmt::Display for CheckpointID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.checkpoint_type, self.key)
    }
}

/// Checkpoint data stored in backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCheckpoint {
    /// Serialized checkpoint (JSON)
    pub checkpoint_data: String,
    /// Checkpoint type for validation
    pub checkpoint_type: String,
    /// Key for validation
    pub key: String,
    /// Timestamp when checkpoint was created
    pub created_at: DateTime<Utc>,
}

/// Trait for checkpoint storage operations.
///
/// A store holds at most one checkpoint per [`CheckpointID`]; storing again
/// replaces the previous one.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint in the storage backend.
    async fn store_checkpoint(&self, id: &CheckpointID, checkpoint_data: String) -> Result<()>;

    /// Read a checkpoint from the storage backend.
    ///
    /// Returns None if the checkpoint doesn't exist.
    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<StoredCheckpoint>>;

    /// Remove a checkpoint. Removing a missing checkpoint is not an error.
    async fn clear_checkpoint(&self, id: &CheckpointID) -> Result<()>;
}
