use thiserror::Error;

/// Failure to deliver a chunk. Fatal for the current step; the migration can
/// resume from the last persisted token.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write the SQL data to the file: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The remote end answered with a `{wpmdb_error, body}` payload.
    #[error("Remote error: {body}")]
    Remote { body: String },

    #[error("Unexpected response from the remote site: {0}")]
    UnexpectedResponse(String),

    /// Executing the chunk against a database failed.
    #[error("{message}")]
    Execution { message: String },
}

impl SinkError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}
