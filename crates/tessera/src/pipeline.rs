//! Data package orchestration.
//!
//! [`fetch_data_package`] runs the whole flow: schedule, horizon, panel
//! fetch and assembly, array materialization and walk-forward batching.

use crate::assembler::{AssembledPanel, PanelSources, assemble, unique_names};
use crate::batching::{BucketSummary, Buckets, WalkForwardBuckets, batch, summarize};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::observer::PipelineObserver;
use crate::schedule::{generate_schedule, warm_start_date};
use chrono::NaiveDate;
use polars::prelude::*;
use tessera_data::frame::{CODE, DX, INDUSTRY, INDUSTRY_CODE, IS_OPEN, TRADE_DATE, WEIGHT};
use tessera_data::{DataEngine, FactorSpec, Transformer};
use tessera_processing::CrossSectionalTransform;
use tracing::debug;

/// Train or predict buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketPair {
    /// Features per window
    pub x: Buckets,
    /// Targets per window
    pub y: Buckets,
}

/// Result of [`fetch_data_package`].
#[derive(Debug, Clone)]
pub struct DataPackage {
    /// Feature names, in column order of every `x` bucket
    pub x_names: Vec<String>,
    /// Row-level targets with their settlement attributes: `trade_date`,
    /// `code`, `dx`, `weight`, `industry`, `industry_code`, `isOpen`, then the
    /// neutralized risk exposures
    pub settlement: DataFrame,
    /// Train buckets
    pub train: BucketPair,
    /// Predict buckets
    pub predict: BucketPair,
}

impl DataPackage {
    fn from_buckets(x_names: Vec<String>, settlement: DataFrame, buckets: WalkForwardBuckets) -> Self {
        Self {
            x_names,
            settlement,
            train: BucketPair {
                x: buckets.train_x,
                y: buckets.train_y,
            },
            predict: BucketPair {
                x: buckets.predict_x,
                y: buckets.predict_y,
            },
        }
    }

    /// Per-window row counts.
    pub fn summary(&self) -> Vec<BucketSummary> {
        summarize(&self.train.x, &self.predict.x, &self.predict.y)
    }
}

/// Schedule and aligned panel, before batching.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Rebalance dates requested from the engine
    pub schedule: Vec<NaiveDate>,
    /// Forward-return horizon in trading days
    pub horizon: usize,
    /// Joined panel
    pub panel: AssembledPanel,
}

/// Build the schedule, fetch every panel and join them.
pub fn prepare_data<E>(engine: &E, transformer: &Transformer, config: &PipelineConfig) -> Result<PreparedData>
where
    E: DataEngine + ?Sized,
{
    config.validate()?;

    let start = warm_start_date(config.start_date, config.warm_start, &config.calendar)?;
    let schedule = generate_schedule(
        start,
        config.end_date,
        config.period()?,
        &config.calendar,
        config.convention,
    )?;
    let horizon = config.period()?.horizon()?;
    debug!("Schedule has {} dates, horizon {horizon}", schedule.len());

    let universe = &config.universe;
    let risk = if config.neutralized_risk.is_empty() {
        None
    } else {
        Some(engine.fetch_risk_panel(universe, &schedule, config.risk_model)?)
    };
    let sources = PanelSources {
        factors: engine.fetch_factor_panel(universe, transformer, &schedule)?,
        returns: engine.fetch_forward_return_panel(universe, &schedule, horizon)?,
        benchmark: engine.fetch_benchmark_panel(config.benchmark, &schedule)?,
        industry: engine.fetch_industry_panel(universe, &schedule)?,
        risk,
    };

    let panel = assemble(sources, &transformer.names(), &config.neutralized_risk)?;
    Ok(PreparedData {
        schedule,
        horizon,
        panel,
    })
}

/// Settlement frame: targets plus the attributes needed to evaluate a
/// prediction, and the exposures used for neutralization.
fn settlement_frame(panel: &AssembledPanel, risk_names: &[String]) -> Result<DataFrame> {
    let mut columns: Vec<&str> = vec![TRADE_DATE, CODE, DX, WEIGHT, INDUSTRY, INDUSTRY_CODE, IS_OPEN];
    columns.extend(risk_names.iter().map(String::as_str));
    Ok(panel.frame().select(columns)?)
}

/// Fetch, align and batch everything the config describes.
///
/// `factors` overrides `config.factors` when it carries derived
/// definitions. The per-window transform is the config's processing
/// pipeline.
pub fn fetch_data_package<E, O>(
    engine: &E,
    factors: FactorSpec,
    config: &PipelineConfig,
    observer: O,
) -> Result<DataPackage>
where
    E: DataEngine + ?Sized,
    O: PipelineObserver,
{
    fetch_data_package_with(engine, factors, config, &config.processing(), observer)
}

/// [`fetch_data_package`] with an explicit per-window transform.
pub fn fetch_data_package_with<E, T, O>(
    engine: &E,
    factors: FactorSpec,
    config: &PipelineConfig,
    transform: &T,
    observer: O,
) -> Result<DataPackage>
where
    E: DataEngine + ?Sized,
    T: CrossSectionalTransform + ?Sized,
    O: PipelineObserver,
{
    observer.info("Starting data package fetching ...");

    let transformer = factors.resolve()?;
    let prepared = prepare_data(engine, &transformer, config)?;
    let panel = &prepared.panel;

    let risk_names = unique_names(&config.neutralized_risk);
    let risk_exposures = if risk_names.is_empty() {
        None
    } else {
        Some(panel.array(&risk_names)?)
    };
    let features = panel.feature_array()?;
    let targets = panel.target_array()?;
    let settlement = settlement_frame(panel, &risk_names)?;

    let date_labels = panel.date_labels()?;
    let mut dates = date_labels.clone();
    dates.dedup();
    if dates.len() < prepared.schedule.len() {
        observer.warn(&format!(
            "{} of {} schedule dates have no rows after joining",
            prepared.schedule.len() - dates.len(),
            prepared.schedule.len()
        ));
    }

    observer.info("Loading data is finished");

    let buckets = batch(
        features.view(),
        targets.view(),
        &dates,
        &date_labels,
        config.batch_size,
        risk_exposures.as_ref().map(|r| r.view()),
        transform,
    )?;

    observer.info("Data processing is finished");

    Ok(DataPackage::from_buckets(transformer.names(), settlement, buckets))
}
