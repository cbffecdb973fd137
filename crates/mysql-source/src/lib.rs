//! MySQL table streaming for wp-db-sync
//!
//! Reads a table in pages, rewrites each cell through the search-replace
//! codec, encodes rows as INSERT tuples or UPDATE statements and hands
//! size-bounded chunks to a [`chunk_sink::ChunkSink`]. One
//! [`TableStreamer::run`] call is one resumable step; the returned
//! [`StepOutcome`] carries the [`ResumeToken`] for the next one.

mod accessor;
mod buffer;
mod cache;
mod cursor;
mod dump;
mod encoder;
mod error;
mod execute;
mod header;
mod keys;
mod preserve;
mod streamer;
mod tables;
mod token;

pub mod testing;

pub use accessor::{DbAccessor, MySqlAccessor, TableEntry};
pub use buffer::{Admit, ChunkBuffer};
pub use cache::{MigrationCache, ALTER_TABLE_BASE};
pub use cursor::{PageCursor, STATE_OPTION_PREFIX};
pub use dump::{backup_header, fetch_post_types};
pub use encoder::{EncodedRow, RowEncoder};
pub use error::{DbError, MigrateError};
pub use execute::{process_chunk, split_statements, strip_invalid_text, ExecuteSink};
pub use header::alter_queries;
pub use keys::PrimaryKeyState;
pub use preserve::preserved_options_queries;
pub use streamer::{DumpLocation, SinkKind, StepOutcome, TableStep, TableStreamer};
pub use tables::{delete_temporary_tables, get_tables};
pub use token::ResumeToken;

/// MySQL source connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    /// MySQL connection URI
    pub source_uri: String,
    /// Database to select after connecting, if the URI names none
    pub source_database: Option<String>,
}
