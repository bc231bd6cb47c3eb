//! Pipeline configuration.

use crate::calendar::{BizDayConvention, Calendar};
use crate::error::{Error, Result};
use crate::frequency::{Period, map_horizon};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_data::{FactorSpec, RiskModel, Universe};
use tessera_processing::{ProcessingPipeline, ProcessingStep};

const fn default_batch_size() -> usize {
    1
}

/// Everything needed to build a data package, except the data engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Factor names to load
    pub factors: Vec<String>,
    /// First schedule date (before any warm-start look-back)
    pub start_date: NaiveDate,
    /// Last schedule date
    pub end_date: NaiveDate,
    /// Rebalance frequency, e.g. `"1w"` or `"1m"`
    pub frequency: String,
    /// Instrument universe
    pub universe: Universe,
    /// Benchmark identifier for weights
    pub benchmark: i64,
    /// Business days to extend the schedule backwards
    #[serde(default)]
    pub warm_start: u32,
    /// Schedule dates per train window
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Risk factors to neutralize against
    #[serde(default)]
    pub neutralized_risk: Vec<String>,
    /// Risk model providing the exposures
    #[serde(default)]
    pub risk_model: RiskModel,
    /// Steps applied before neutralization
    #[serde(default)]
    pub pre_process: Vec<ProcessingStep>,
    /// Steps applied after neutralization
    #[serde(default)]
    pub post_process: Vec<ProcessingStep>,
    /// Trading calendar
    #[serde(default)]
    pub calendar: Calendar,
    /// Adjustment of schedule dates falling on closed days
    #[serde(default)]
    pub convention: BizDayConvention,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            factors: vec!["EPS".to_string()],
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
            frequency: "1w".to_string(),
            universe: Universe::new("zz800"),
            benchmark: 905,
            warm_start: 0,
            batch_size: default_batch_size(),
            neutralized_risk: Vec::new(),
            risk_model: RiskModel::default(),
            pre_process: vec![ProcessingStep::winsorize(), ProcessingStep::Standardize],
            post_process: vec![ProcessingStep::Standardize],
            calendar: Calendar::default(),
            convention: BizDayConvention::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the schedule settings before any data is touched.
    ///
    /// Factor names are checked when they are resolved.
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(Error::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }
        map_horizon(&self.frequency)?;
        Ok(())
    }

    /// Parsed rebalance period.
    pub fn period(&self) -> Result<Period> {
        self.frequency.parse()
    }

    /// Factor input for the pipeline.
    pub fn factor_spec(&self) -> FactorSpec {
        FactorSpec::Names(self.factors.clone())
    }

    /// Per-window transform.
    pub fn processing(&self) -> ProcessingPipeline {
        ProcessingPipeline::new(self.pre_process.clone(), self.post_process.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config = PipelineConfig::from_json(
            r#"{
                "factors": ["EPS", "BP"],
                "start_date": "2024-01-02",
                "end_date": "2024-03-29",
                "frequency": "2w",
                "universe": {"name": "zz500"},
                "benchmark": 905
            }"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 1);
        assert_eq!(config.warm_start, 0);
        assert_eq!(config.risk_model, RiskModel::Short);
        assert!(config.pre_process.is_empty());
        assert_eq!(config.convention, BizDayConvention::Following);
        assert_eq!(config.universe, Universe::new("zz500"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_processing_steps_from_json() {
        let config = PipelineConfig::from_json(
            r#"{
                "factors": ["EPS"],
                "start_date": "2024-01-02",
                "end_date": "2024-03-29",
                "frequency": "1m",
                "universe": {"name": "custom", "codes": ["A", "B"]},
                "benchmark": 300,
                "risk_model": "long",
                "neutralized_risk": ["SIZE"],
                "pre_process": [{"kind": "winsorize", "num_stds": 2.5}, {"kind": "standardize"}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.risk_model, RiskModel::Long);
        assert_eq!(
            config.processing().pre_process,
            vec![ProcessingStep::Winsorize { num_stds: 2.5 }, ProcessingStep::Standardize]
        );
        assert_eq!(config.universe.codes().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_round_trip_json() {
        let config = PipelineConfig::default();
        assert_eq!(PipelineConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PipelineConfig {
            frequency: "1y".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::UnrecognizedFrequency(_))));

        config.frequency = "1w".to_string();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidBatchSize)));

        config.batch_size = 1;
        config.end_date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidDateRange { .. })));
    }
}
