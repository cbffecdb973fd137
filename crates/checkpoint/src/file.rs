//! Checkpoint file wrapper for storage-agnostic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, StoredCheckpoint};

/// Storage-agnostic checkpoint wrapper.
///
/// # File Format
///
/// ```json
/// {
///     "checkpoint_type": "wp-table",
///     "key": "wp_posts",
///     "checkpoint": {
///         "current_row": 200,
///         "primary_keys": "a:1:{s:2:\"ID\";s:3:\"214\";}"
///     },
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Checkpoint type identifier (e.g. "wp-table")
    pub checkpoint_type: String,
    /// What the checkpoint belongs to, such as a table name
    pub key: String,
    /// Serialized checkpoint data as JSON Value
    pub checkpoint: serde_json::Value,
    /// Timestamp when this checkpoint file was created
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Create a new checkpoint file from a typed checkpoint.
    pub fn new<C: Checkpoint>(checkpoint: &C, key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            checkpoint_type: C::CHECKPOINT_TYPE.to_string(),
            key: key.to_string(),
            checkpoint: serde_json::to_value(checkpoint)?,
            created_at: Utc::now(),
        })
    }

    /// Parse the checkpoint into its typed form.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `checkpoint_type` doesn't match `C::CHECKPOINT_TYPE`
    /// - The checkpoint data can't be deserialized into type `C`
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.checkpoint_type != C::CHECKPOINT_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::CHECKPOINT_TYPE,
                self.checkpoint_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    pub fn checkpoint_type(&self) -> &str {
        &self.checkpoint_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl TryFrom<StoredCheckpoint> for CheckpointFile {
    type Error = anyhow::Error;

    fn try_from(stored: StoredCheckpoint) -> anyhow::Result<Self> {
        Ok(Self {
            checkpoint: serde_json::from_str(&stored.checkpoint_data)?,
            checkpoint_type: stored.checkpoint_type,
            key: stored.key,
            created_at: stored.created_at,
        })
    }
}
