//! Error types for the tessera pipeline.

use chrono::NaiveDate;
use tessera_data::DataError;
use tessera_processing::ProcessingError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a data package.
#[derive(Debug, Error)]
pub enum Error {
    /// Frequency token whose unit has no horizon (years, unknown units,
    /// unparseable input)
    #[error("{0} is an unrecognized frequency rule")]
    UnrecognizedFrequency(String),

    /// Recognised unit with a non-positive length
    #[error("Invalid frequency {0}: length must be positive")]
    InvalidFrequency(String),

    /// A join stage left no rows
    #[error("No rows left after joining the {stage} panel")]
    MissingJoinKey {
        /// Join stage that emptied the frame
        stage: String,
    },

    /// A source panel carries the same `(trade_date, code)` key more than once
    #[error("Duplicate key ({trade_date}, {code}) in the {panel} panel")]
    DuplicateKey {
        /// Panel holding the duplicate
        panel: String,
        /// Duplicated date
        trade_date: NaiveDate,
        /// Duplicated instrument
        code: String,
    },

    /// Batch size of zero
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    /// Arrays handed to the batching engine are not row-aligned
    #[error("Dimension mismatch for {context}: expected {expected} rows, got {actual}")]
    DimensionMismatch {
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
        /// What was being compared
        context: String,
    },

    /// Schedule dates are not strictly increasing
    #[error("Schedule dates must be strictly increasing: {0} follows {1}")]
    UnorderedSchedule(NaiveDate, NaiveDate),

    /// Start date after end date
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Range start
        start: NaiveDate,
        /// Range end
        end: NaiveDate,
    },

    /// Date arithmetic left the representable range
    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data engine error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Cross-sectional processing error
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
