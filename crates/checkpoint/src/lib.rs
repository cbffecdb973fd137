//! Checkpoint management for wp-db-sync
//!
//! A migration runs as a sequence of steps, and each step ends with a resume
//! token describing where the next one continues. This crate persists those
//! tokens so an interrupted migration can pick up where it stopped.
//!
//! # Architecture
//!
//! - `Checkpoint` trait for the token types that get persisted
//! - `CheckpointFile` wrapper for storage-agnostic serialization
//! - `CheckpointStore` trait for storage backends, keyed by [`CheckpointID`]
//! - `CheckpointManager` to save, load and clear typed checkpoints
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - One JSON file per checkpoint id, overwritten on save
//! - `NullStore` - Discards everything, for runs that should not be resumable

mod config;
mod file;
mod filesystem;
mod manager;
pub mod store;


// Re-export config types
pub use config::{CheckpointConfig, DEFAULT_CHECKPOINT_DIR};

// Re-export file types
pub use file::CheckpointFile;

// Re-export manager types
pub use manager::{CheckpointManager, NullStore};

// Re-export store trait and types
pub use store::{CheckpointID, CheckpointStore, StoredCheckpoint};

// Re-export storage implementations
pub use filesystem::FilesystemStore;

/// Trait that persisted checkpoint types implement.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct RowCheckpoint {
///     pub row: i64,
/// }
///
/// impl Checkpoint for RowCheckpoint {
///     const CHECKPOINT_TYPE: &'static str = "row";
///
///     fn to_cli_string(&self) -> String {
///         self.row.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { row: s.trim().parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Checkpoint type identifier, stored alongside the data and checked when
    /// loading.
    const CHECKPOINT_TYPE: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    /// This format is used for:
    /// - Command-line arguments (e.g., `--resume-from`)
    /// - Logging and debugging output
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    ///
    /// Should parse the format produced by `to_cli_string()`.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}

/// Reads every checkpoint file in a directory, oldest first.
///
/// Standalone function that doesn't require a store. Useful for tests and for
/// listing what an interrupted run left behind.
pub async fn list_checkpoints<P: AsRef<std::path::Path>>(
    checkpoint_dir: P,
) -> anyhow::Result<Vec<CheckpointFile>> {
    let dir = checkpoint_dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "json")
            .unwrap_or(false);
        if !is_json {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let stored: StoredCheckpoint = serde_json::from_str(&content)?;
        files.push(CheckpointFile::try_from(stored)?);
    }
    files.sort_by_key(|file| file.created_at);
    Ok(files)
}
