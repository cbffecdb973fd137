//! Chunk sinks that deliver generated SQL outside the process
//!
//! # Sink Types
//!
//! - **Local**: a dump file on the local filesystem, plain or gzip-compressed
//! - **HTTP/HTTPS**: the remote site's chunk endpoint, one signed multipart
//!   POST per transfer
//!
//! # Example
//!
//! ```ignore
//! use wp_db_sync_file::{dump_file_name, SinkTarget};
//!
//! let name = dump_file_name("my_site", "backup", chrono::Local::now(), "x7k2q", true);
//! let target = SinkTarget::parse(&format!("/var/backups/{name}"))?;
//! let sink = target.open(&Default::default()).await?;
//! ```

mod http;
mod local;

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use chunk_sink::ChunkSink;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;

pub use http::{sign, HttpChunkSink, PROCESS_CHUNK_ACTION};
pub use local::LocalFileSink;

/// Where a migration step sends its SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// Dump file (gzip-compressed if the name ends with `.gz`)
    Local(PathBuf),
    /// Remote chunk endpoint
    Http(String),
}

/// Settings only some targets use.
#[derive(Debug, Clone, Default)]
pub struct SinkOptions {
    /// Shared secret for request signatures.
    pub key: String,
    /// Identifies the migration on the remote side.
    pub remote_state_id: String,
    /// zlib-compress chunks sent over HTTP.
    pub gzip: bool,
    /// Append to an existing dump instead of starting a new one.
    pub append: bool,
}

impl SinkTarget {
    /// Parse a string into a SinkTarget, auto-detecting the type
    ///
    /// - `http://` or `https://` -> Http
    /// - Everything else -> Local
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            anyhow::bail!("Output location must not be empty");
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            Ok(SinkTarget::Http(uri.to_string()))
        } else {
            Ok(SinkTarget::Local(PathBuf::from(uri)))
        }
    }

    pub fn is_gzip(&self) -> bool {
        match self {
            SinkTarget::Local(path) => path.extension().is_some_and(|ext| ext == "gz"),
            SinkTarget::Http(_) => false,
        }
    }

    /// Open the sink this target describes.
    pub async fn open(&self, options: &SinkOptions) -> Result<Box<dyn ChunkSink>> {
        match self {
            SinkTarget::Local(path) => {
                let sink = if options.append {
                    LocalFileSink::append(path.clone(), self.is_gzip())
                } else {
                    LocalFileSink::create(path.clone(), self.is_gzip())?
                };
                Ok(Box::new(sink))
            }
            SinkTarget::Http(url) => Ok(Box::new(HttpChunkSink::new(
                url.clone(),
                options.remote_state_id.clone(),
                options.key.clone(),
                options.gzip,
            ))),
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            SinkTarget::Local(path) => path.display().to_string(),
            SinkTarget::Http(url) => url.clone(),
        }
    }
}

/// `<db-slug>-<type>-<YYYYmmddHHMMSS>-<salt>.sql`, with `.gz` appended when
/// the dump is compressed.
pub fn dump_file_name<Tz: TimeZone>(
    database: &str,
    migration_type: &str,
    at: DateTime<Tz>,
    salt: &str,
    gzip: bool,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut name = format!(
        "{}-{}-{}-{}.sql",
        slug(database),
        migration_type,
        at.format("%Y%m%d%H%M%S"),
        salt.to_lowercase()
    );
    if gzip {
        name.push_str(".gz");
    }
    name
}

/// Five random lowercase alphanumerics.
pub fn session_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Lowercase, with runs of anything but ASCII alphanumerics, `_` and `-`
/// collapsed into one dash.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
