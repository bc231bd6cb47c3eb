//! CLI error type.

use std::path::PathBuf;
use tessera_data::DataError;
use thiserror::Error;

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// The database file does not exist
    #[error("Database not found: {}", .0.display())]
    DatabaseNotFound(PathBuf),

    /// No platform cache directory and no explicit path
    #[error("Could not determine a cache directory; pass --db")]
    NoCacheDir,

    /// CSV read or write failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Storage failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Pipeline failure
    #[error(transparent)]
    Pipeline(#[from] tessera::Error),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
