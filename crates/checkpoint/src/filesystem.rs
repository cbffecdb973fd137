//! Filesystem-based checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;

use crate::store::{CheckpointID, CheckpointStore, StoredCheckpoint};

/// Filesystem implementation of CheckpointStore trait.
///
/// Stores each checkpoint as `checkpoint_{type}_{key}.json` in a directory.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, id: &CheckpointID) -> PathBuf {
        self.dir.join(format!(
            "checkpoint_{}_{}.json",
            sanitize(&id.checkpoint_type),
            sanitize(&id.key)
        ))
    }
}

/// Keeps file names portable: anything but ASCII alphanumerics, `-` and `_`
/// becomes `_`.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CheckpointStore for FilesystemStore {
    async fn store_checkpoint(&self, id: &CheckpointID, checkpoint_data: String) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;

        let stored = StoredCheckpoint {
            checkpoint_data,
            checkpoint_type: id.checkpoint_type.clone(),
            key: id.key.clone(),
            created_at: Utc::now(),
        };

        let filename = self.path_for(id);
        let tmp = filename.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&stored)?)?;
        std::fs::rename(&tmp, &filename)?;
        tracing::debug!("Stored checkpoint {id} to {}", filename.display());
        Ok(())
    }

    async fn read_checkpoint(&self, id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        let stored: StoredCheckpoint = serde_json::from_str(&content)?;
        if stored.checkpoint_type != id.checkpoint_type || stored.key != id.key {
            anyhow::bail!(
                "Checkpoint file {} belongs to {}/{}, not {id}",
                path.display(),
                stored.checkpoint_type,
                stored.key
            );
        }
        Ok(Some(stored))
    }

    async fn clear_checkpoint(&self, id: &CheckpointID) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Cleared checkpoint {id}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
