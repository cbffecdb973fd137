//! Typed checkpoint operations on top of a store.

use anyhow::Result;
use async_trait::async_trait;

use crate::{Checkpoint, CheckpointFile, CheckpointID, CheckpointStore, StoredCheckpoint};

/// Saves, loads and clears typed checkpoints.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{CheckpointManager, FilesystemStore};
///
/// let manager = CheckpointManager::new(Box::new(FilesystemStore::new("/tmp/checkpoints")));
/// manager.save("wp_posts", &token).await?;
/// let token: Option<ResumeToken> = manager.load("wp_posts").await?;
/// ```
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
}

impl CheckpointManager {
    pub fn new(store: Box<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// A manager that persists nothing.
    pub fn disabled() -> Self {
        Self::new(Box::new(NullStore))
    }

    pub async fn save<C: Checkpoint>(&self, key: &str, checkpoint: &C) -> Result<()> {
        let id = CheckpointID::new(C::CHECKPOINT_TYPE, key);
        let checkpoint_data = serde_json::to_string(checkpoint)?;
        self.store.store_checkpoint(&id, checkpoint_data).await?;
        tracing::debug!("Saved checkpoint {id}: {}", checkpoint.to_cli_string());
        Ok(())
    }

    /// Loads the checkpoint for `key`, or `None` when there is none.
    pub async fn load<C: Checkpoint>(&self, key: &str) -> Result<Option<C>> {
        let id = CheckpointID::new(C::CHECKPOINT_TYPE, key);
        match self.store.read_checkpoint(&id).await? {
            Some(stored) => {
                let file = CheckpointFile::try_from(stored)?;
                let checkpoint = file.parse::<C>()?;
                tracing::info!("Resuming {id} from {}", checkpoint.to_cli_string());
                Ok(Some(checkpoint))
            }
            None => Ok(None),
        }
    }

    pub async fn clear<C: Checkpoint>(&self, key: &str) -> Result<()> {
        let id = CheckpointID::new(C::CHECKPOINT_TYPE, key);
        self.store.clear_checkpoint(&id).await
    }
}

/// Store that keeps nothing.
pub struct NullStore;

#[async_trait]
impl CheckpointStore for NullStore {
    async fn store_checkpoint(&self, _id: &CheckpointID, _checkpoint_data: String) -> Result<()> {
        Ok(())
    }

    async fn read_checkpoint(&self, _id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        Ok(None)
    }

    async fn clear_checkpoint(&self, _id: &CheckpointID) -> Result<()> {
        Ok(())
    }
}
