//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Missing data
    #[error("Missing data for {dataset}: {reason}")]
    MissingData {
        /// Dataset that was queried
        dataset: String,
        /// Reason for missing data
        reason: String,
    },

    /// Risk model name not known to the backing store
    #[error("Unknown risk model: {0}")]
    UnknownRiskModel(String),

    /// Universe with no membership data
    #[error("Unknown universe: {0}")]
    UnknownUniverse(String),

    /// Two factor definitions share a name
    #[error("Duplicate factor name: {0}")]
    DuplicateFactor(String),

    /// Factor list is empty
    #[error("No factors requested")]
    NoFactors,
}
