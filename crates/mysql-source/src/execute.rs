//! Applying generated SQL to a database.

use std::sync::Arc;

use async_trait::async_trait;
use chunk_sink::{ChunkSink, SinkError, Transfer};
use sync_core::MigrationOptions;
use tracing::{debug, warn};

use crate::accessor::DbAccessor;
use crate::error::MigrateError;

const SQL_MODE: &[u8] = b"SET sql_mode='NO_AUTO_VALUE_ON_ZERO';";

/// Splits a chunk into statements on `;\n`, dropping empty pieces.
pub fn split_statements(chunk: &[u8]) -> Vec<&[u8]> {
    let mut statements = Vec::new();
    let mut rest = chunk;
    while let Some(pos) = rest.windows(2).position(|w| w == b";\n") {
        statements.push(&rest[..pos]);
        rest = &rest[pos + 2..];
    }
    statements.push(rest);
    statements
        .into_iter()
        .filter(|s| s.iter().any(|b| !b.is_ascii_whitespace()))
        .collect()
}

/// Drops every byte sequence that is not valid UTF-8.
pub fn strip_invalid_text(query: &[u8]) -> Vec<u8> {
    query
        .utf8_chunks()
        .flat_map(|chunk| chunk.valid().as_bytes().iter().copied())
        .collect()
}

/// The table an INSERT or UPDATE writes to, without the temp prefix.
fn table_from_query(query: &[u8], temp_prefix: &str) -> String {
    let text = String::from_utf8_lossy(query);
    let name = text
        .split('`')
        .nth(1)
        .map(str::to_string)
        .unwrap_or_default();
    name.strip_prefix(temp_prefix)
        .map(str::to_string)
        .unwrap_or(name)
}

fn writes_rows(query: &[u8]) -> bool {
    query.windows(6).any(|w| w == b"INSERT") || query.windows(6).any(|w| w == b"UPDATE")
}

/// Executes every statement of `chunk`, after switching the session to
/// `NO_AUTO_VALUE_ON_ZERO`.
///
/// A failing INSERT or UPDATE holding invalid UTF-8 is retried once with the
/// invalid bytes removed when `strip_invalid_text` is on.
pub async fn process_chunk(
    db: &dyn DbAccessor,
    options: &MigrationOptions,
    chunk: &[u8],
) -> Result<(), MigrateError> {
    let statements = split_statements(chunk);
    debug!("Executing {} statements", statements.len());

    for query in std::iter::once(SQL_MODE).chain(statements) {
        let Err(err) = db.execute(query).await else {
            continue;
        };

        let invalid = std::str::from_utf8(query).is_err();
        if !(writes_rows(query) && invalid) {
            return Err(MigrateError::sql_execution(err.to_string()));
        }

        if !options.strip_invalid_text {
            let table = table_from_query(query, &options.temp_prefix);
            return Err(MigrateError::sql_execution(format!(
                "The table `{table}` contains characters which are invalid in the target database."
            )));
        }

        warn!("Retrying a statement without its invalid text: {err}");
        let stripped = strip_invalid_text(query);
        if let Err(err) = db.execute(&stripped).await {
            return Err(MigrateError::sql_execution(format!(
                "Failed to import the stripped SQL query: {err}"
            )));
        }
    }
    Ok(())
}

/// Sink that executes each transferred chunk against a database.
pub struct ExecuteSink {
    db: Arc<dyn DbAccessor>,
    options: MigrationOptions,
    pending: Vec<u8>,
}

impl ExecuteSink {
    pub fn new(db: Arc<dyn DbAccessor>, options: MigrationOptions) -> Self {
        Self {
            db,
            options,
            pending: Vec::new(),
        }
    }
}

#[async_trait]
impl ChunkSink for ExecuteSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.pending.extend_from_slice(chunk);
        Ok(())
    }

    async fn transfer(&mut self, transfer: &Transfer) -> Result<(), SinkError> {
        let chunk = std::mem::take(&mut self.pending);
        if chunk.is_empty() {
            return Ok(());
        }
        debug!("Executing {} bytes for {}", chunk.len(), transfer.table);
        process_chunk(self.db.as_ref(), &self.options, &chunk)
            .await
            .map_err(|e| SinkError::execution(e.to_string()))
    }
}
