//! wp-db-sync Library
//!
//! Migrates a WordPress database between hosts, or to and from a dump file,
//! rewriting URLs and paths inside serialized and JSON values without
//! breaking them.
//!
//! # Crates
//!
//! - `sync_core` - migration context, options, hooks and rows
//! - `php_types` - PHP serialization format
//! - `search_replace` - serialization-safe find and replace
//! - `mysql_types` - column classification, SQL literals and DDL rewriting
//! - `wp_db_sync_mysql_source` - table streaming over MySQL
//! - `wp_db_sync_file` - dump file and remote endpoint sinks
//! - `checkpoint` - resume token persistence
//!
//! # CLI Usage
//!
//! ```bash
//! # Export a dump described by a profile
//! wp-db-sync migrate --profile savefile.toml --source-uri mysql://root@localhost/wp
//!
//! # Run one step of one table and print the response body
//! wp-db-sync step --profile pull.toml --table wp_posts --resume "200,a:0:{}"
//! ```

use clap::Parser;

pub mod config;
pub mod sync;

pub use config::{Profile, RemoteConfig};
pub use sync::{run_step, Migration, MigrationSummary};

/// Source database connection options
#[derive(Parser, Clone, Debug)]
pub struct SourceOpts {
    /// MySQL connection URI
    #[arg(long, env = "WP_DB_SYNC_SOURCE_URI")]
    pub source_uri: String,

    /// Database to select, if the URI names none
    #[arg(long, env = "WP_DB_SYNC_SOURCE_DATABASE")]
    pub source_database: Option<String>,
}

impl From<&SourceOpts> for wp_db_sync_mysql_source::SourceOpts {
    fn from(opts: &SourceOpts) -> Self {
        Self {
            source_uri: opts.source_uri.clone(),
            source_database: opts.source_database.clone(),
        }
    }
}
