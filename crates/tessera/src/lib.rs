#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tessera/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembler;
pub mod batching;
pub mod calendar;
pub mod config;
pub mod error;
pub mod frequency;
pub mod observer;
pub mod pipeline;
pub mod schedule;

// Re-export sub-crates
pub use tessera_data as data;
pub use tessera_processing as processing;

pub use assembler::{AssembledPanel, PanelSources, assemble, incremental_risk_names};
pub use batching::{BucketSummary, Buckets, WalkForwardBuckets, batch};
pub use calendar::{BizDayConvention, Calendar};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use frequency::{Period, TimeUnit, map_horizon};
pub use observer::{PipelineObserver, SilentObserver, TracingObserver};
pub use pipeline::{
    BucketPair, DataPackage, PreparedData, fetch_data_package, fetch_data_package_with, prepare_data,
};
pub use schedule::{generate_schedule, warm_start_date};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
