use chunk_sink::SinkError;
use mysql_types::SchemaError;
use thiserror::Error;

/// A query or statement the database rejected.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    #[error("{message}")]
    Query { message: String },
}

impl DbError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Fatal errors of one table step.
///
/// Cell-level problems never get here; the value codec logs them and keeps
/// the original value.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A chunk could not be applied to the database.
    #[error("{message}")]
    SqlExecution { message: String },

    #[error(transparent)]
    Transport(SinkError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Checkpoint error: {0:#}")]
    Checkpoint(anyhow::Error),
}

impl MigrateError {
    pub fn sql_execution(message: impl Into<String>) -> Self {
        Self::SqlExecution {
            message: message.into(),
        }
    }
}

impl From<SinkError> for MigrateError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Execution { message } => MigrateError::SqlExecution { message },
            other => MigrateError::Transport(other),
        }
    }
}
