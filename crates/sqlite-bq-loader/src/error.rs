//! Error types for the loader library.

use thiserror::Error;

/// Main error type for load operations.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration error (invalid YAML, missing project, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite open or query error
    #[error("Source database error: {0}")]
    Source(#[from] rusqlite::Error),

    /// SQLite connection used after `close`
    #[error("Source database error: connection is closed")]
    SourceClosed,

    /// Token could not be obtained from Application Default Credentials
    #[error("BigQuery authentication failed: {0}")]
    Auth(#[from] gcp_auth::Error),

    /// Transport-level HTTP failure talking to BigQuery
    #[error("BigQuery request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// BigQuery answered with a non-success status
    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Load job finished with an error result
    #[error("Load job failed for table {table}: {message}")]
    LoadJob { table: String, message: String },

    /// Row set shape error (row arity mismatch)
    #[error("Row set error: {0}")]
    RowSet(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Blocking SQLite task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl LoadError {
    /// Create an Api error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        LoadError::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a LoadJob error
    pub fn load_job(table: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::LoadJob {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            LoadError::Config(_) | LoadError::Yaml(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for load operations.
pub type Result<T> = std::result::Result<T, LoadError>;
