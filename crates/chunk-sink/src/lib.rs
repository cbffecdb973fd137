//! Chunk sink trait abstraction.
//!
//! A table streamer produces SQL text and hands it to a `ChunkSink`. What the
//! sink does with it depends on the migration: append it to a dump file, send
//! it to the remote site, or execute it against the local database. The
//! streamer only sees this trait.
//!
//! A step has two kinds of calls:
//!
//! - [`ChunkSink::write_chunk`] for every piece of SQL produced (headers, INSERT
//!   batches, UPDATE statements, footers)
//! - [`ChunkSink::transfer`] once at the end of the step, when the buffer is
//!   full or the table is done

mod error;
mod memory;

pub use error::SinkError;
pub use memory::MemorySink;

/// What the streamer knows about the step being transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Source table the chunk was produced from.
    pub table: String,
}

impl Transfer {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
        }
    }
}

/// Destination for generated SQL.
///
/// # Usage Pattern
///
/// ```ignore
/// sink.write_chunk(b"DROP TABLE IF EXISTS `wp_posts`;\n").await?;
/// sink.write_chunk(&insert_batch).await?;
/// sink.transfer(&Transfer::new("wp_posts")).await?;
/// ```
///
/// Implementations must not send any byte twice: after `transfer` returns,
/// everything written so far is considered delivered.
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    /// Accept a piece of SQL text.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError>;

    /// Deliver everything written since the previous transfer.
    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError>;

    /// Take the SQL text a caller must relay itself, for sinks that return the
    /// chunk in the step response instead of delivering it.
    fn take_response(&mut self) -> Option<Vec<u8>> {
        None
    }
}

#[async_trait::async_trait]
impl<S: ChunkSink + ?Sized> ChunkSink for Box<S> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        (**self).write_chunk(chunk).await
    }

    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError> {
        (**self).transfer(transfer).await
    }

    fn take_response(&mut self) -> Option<Vec<u8>> {
        (**self).take_response()
    }
}
