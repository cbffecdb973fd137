//! Resume token passed between table steps.

use anyhow::Context;
use checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Where the next step of a table starts.
///
/// `current_row` counts the rows already handled; `-1` means the table is
/// finished. `primary_keys` is the serialized key snapshot of the last row
/// handled, empty when the table is paged by offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub current_row: i64,
    #[serde(default)]
    pub primary_keys: String,
}

impl ResumeToken {
    pub fn new(current_row: i64, primary_keys: impl Into<String>) -> Self {
        Self {
            current_row,
            primary_keys: primary_keys.into(),
        }
    }

    pub fn finished() -> Self {
        Self::new(-1, "")
    }

    pub fn is_finished(&self) -> bool {
        self.current_row == -1
    }

    /// First row of the step. A negative row restarts the table.
    pub fn row_start(&self) -> u64 {
        u64::try_from(self.current_row).unwrap_or(0)
    }
}

impl Checkpoint for ResumeToken {
    const CHECKPOINT_TYPE: &'static str = "wp-table";

    /// `<current_row>,<primary_keys>`, the form the remote end sends back.
    fn to_cli_string(&self) -> String {
        format!("{},{}", self.current_row, self.primary_keys)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (row, keys) = s.split_once(',').unwrap_or((s, ""));
        let current_row = row
            .trim()
            .parse()
            .with_context(|| format!("Invalid row number in resume token '{s}'"))?;
        Ok(Self::new(current_row, keys))
    }
}

impl std::str::FromStr for ResumeToken {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cli_string(s).map_err(MigrateError::Checkpoint)
    }
}
