#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod linalg;
pub mod pipeline;
pub mod steps;

pub use error::{ProcessingError, Result};
pub use linalg::{ColumnSpace, RANK_TOLERANCE, least_squares_residuals};
pub use pipeline::{CrossSectionalTransform, ProcessingPipeline, factor_processing};
pub use steps::{ProcessingStep, demean, standardize, winsorize_normal};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
