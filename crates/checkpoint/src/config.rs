//! Checkpoint configuration.

use crate::{CheckpointManager, FilesystemStore};

/// Default directory for checkpoint files.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".wp-db-sync-checkpoints";

/// Controls whether and where resume tokens are persisted.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Whether to persist resume tokens between steps.
    pub emit_checkpoints: bool,

    /// Directory for checkpoint files.
    ///
    /// If `None`, checkpoints are disabled even if `emit_checkpoints` is `true`.
    pub checkpoint_dir: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            emit_checkpoints: true,
            checkpoint_dir: Some(DEFAULT_CHECKPOINT_DIR.to_string()),
        }
    }
}

impl CheckpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(checkpoint_dir: impl Into<String>) -> Self {
        Self {
            emit_checkpoints: true,
            checkpoint_dir: Some(checkpoint_dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            emit_checkpoints: false,
            checkpoint_dir: None,
        }
    }

    /// Check if checkpoint emission is enabled and configured.
    pub fn should_emit_checkpoints(&self) -> bool {
        self.emit_checkpoints && self.checkpoint_dir.is_some()
    }

    /// Builds the manager this configuration describes.
    pub fn manager(&self) -> CheckpointManager {
        match (&self.checkpoint_dir, self.emit_checkpoints) {
            (Some(dir), true) => CheckpointManager::new(Box::new(FilesystemStore::new(dir))),
            _ => CheckpointManager::disabled(),
        }
    }
}
