//! Error types for cross-sectional processing.

use thiserror::Error;

/// Result type for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Errors that can occur while transforming a cross-section.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Row counts of values and risk exposures disagree
    #[error("Dimension mismatch for {context}: expected {expected} rows, got {actual}")]
    DimensionMismatch {
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
        /// What was being compared
        context: String,
    },

    /// Invalid step parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
