//! Migration profiles.
//!
//! A profile is a TOML file describing one migration: the context shared by
//! every step, the tables to stream and where the generated SQL goes.
//!
//! ```toml
//! intent = "push"
//! stage = "migrate"
//! tables = ["wp_options", "wp_posts"]
//! output = "https://remote.example/wp-admin/admin-ajax.php"
//!
//! [[pairs]]
//! search = "//local.test"
//! replace = "//remote.example"
//!
//! [options]
//! rows_per_segment = 200
//! keep_active_plugins = true
//!
//! [remote]
//! remote_state_id = "5f3a"
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use sync_core::MigrationContext;
use wp_db_sync_file::SinkOptions;

/// Credentials for the remote chunk endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Shared secret used to sign requests.
    pub key: String,
    /// Identifies the migration on the remote side.
    pub remote_state_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub context: MigrationContext,
    /// Tables to stream, in order. Empty means every table carrying the
    /// table prefix.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Dump file path or remote endpoint URL.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Profile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid profile {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let profile: Profile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let options = &self.context.options;
        if options.rows_per_segment == 0 {
            anyhow::bail!("rows_per_segment must be greater than zero");
        }
        if options.maximum_chunk_size == 0 {
            anyhow::bail!("maximum_chunk_size must be greater than zero");
        }
        if options.temp_prefix.is_empty() {
            anyhow::bail!("temp_prefix must not be empty");
        }
        if self.context.pairs.iter().any(|pair| pair.search.is_empty()) {
            anyhow::bail!("Replace pairs need a non-empty search string");
        }
        Ok(())
    }

    /// Sink settings for a remote endpoint, honouring the `gzip_file` option.
    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            key: self.remote.key.clone(),
            remote_state_id: self.remote.remote_state_id.clone(),
            gzip: self.context.options.gzip_file,
            append: false,
        }
    }
}
