#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod frame;
pub mod returns;
pub mod risk_model;
pub mod transformer;
pub mod universe;

pub use engine::sqlite::{
    BenchmarkWeight, FactorValue, IndustryRecord, MarketBar, RiskExposure, UniverseMember,
};
pub use engine::{DataEngine, InMemoryEngine, SqliteEngine, SqliteStats};
pub use error::{DataError, Result};
pub use risk_model::RiskModel;
pub use transformer::{FactorDefinition, FactorSpec, Transformer};
pub use universe::Universe;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
