//! Engine serving pre-built polars frames.

use super::{DataEngine, restrict_to_universe};
use crate::error::{DataError, Result};
use crate::frame::{
    CHG_PCT, CODE, INDUSTRY, INDUSTRY_CODE, IS_OPEN, TRADE_DATE, WEIGHT, require_columns,
    restrict_to_dates,
};
use crate::returns::forward_returns;
use crate::risk_model::RiskModel;
use crate::transformer::Transformer;
use crate::universe::Universe;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;

/// In-memory [`DataEngine`].
///
/// Frames are keyed by `(trade_date, code)` and hold full daily history:
///
/// - market: `isOpen`, `chg_pct`
/// - factors: raw factor columns
/// - industries: `industry_code`, `industry`
/// - benchmarks (per id): `weight`
/// - risk exposures (per model): one column per risk factor
/// - universes (per name): membership rows
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    market: Option<DataFrame>,
    factors: Option<DataFrame>,
    industries: Option<DataFrame>,
    benchmarks: HashMap<i64, DataFrame>,
    risk_exposures: HashMap<RiskModel, DataFrame>,
    universes: HashMap<String, DataFrame>,
}

impl InMemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daily market frame (`trade_date`, `code`, `isOpen`, `chg_pct`).
    pub fn with_market(mut self, market: DataFrame) -> Result<Self> {
        require_columns(&market, "market", &[TRADE_DATE, CODE, IS_OPEN, CHG_PCT])?;
        self.market = Some(market);
        Ok(self)
    }

    /// Set the raw factor frame (`trade_date`, `code`, factor columns...).
    pub fn with_factors(mut self, factors: DataFrame) -> Result<Self> {
        require_columns(&factors, "factors", &[TRADE_DATE, CODE])?;
        self.factors = Some(factors);
        Ok(self)
    }

    /// Set the industry frame (`trade_date`, `code`, `industry_code`, `industry`).
    pub fn with_industries(mut self, industries: DataFrame) -> Result<Self> {
        require_columns(&industries, "industries", &[TRADE_DATE, CODE, INDUSTRY_CODE, INDUSTRY])?;
        self.industries = Some(industries);
        Ok(self)
    }

    /// Add a benchmark weight frame (`trade_date`, `code`, `weight`).
    pub fn with_benchmark(mut self, benchmark: i64, weights: DataFrame) -> Result<Self> {
        require_columns(&weights, "benchmark", &[TRADE_DATE, CODE, WEIGHT])?;
        self.benchmarks.insert(benchmark, weights);
        Ok(self)
    }

    /// Add risk exposures for a model (`trade_date`, `code`, risk factors...).
    pub fn with_risk_exposures(mut self, model: RiskModel, exposures: DataFrame) -> Result<Self> {
        require_columns(&exposures, "risk exposures", &[TRADE_DATE, CODE])?;
        self.risk_exposures.insert(model, exposures);
        Ok(self)
    }

    /// Add point-in-time membership for a named universe (`trade_date`, `code`).
    pub fn with_universe(mut self, name: impl Into<String>, members: DataFrame) -> Result<Self> {
        require_columns(&members, "universe", &[TRADE_DATE, CODE])?;
        self.universes.insert(name.into(), members);
        Ok(self)
    }

    fn dataset<'a>(frame: Option<&'a DataFrame>, dataset: &str) -> Result<&'a DataFrame> {
        frame.ok_or_else(|| DataError::MissingData {
            dataset: dataset.to_string(),
            reason: "not loaded".to_string(),
        })
    }

    fn restrict(&self, frame: LazyFrame, universe: &Universe, dates: &[NaiveDate]) -> Result<DataFrame> {
        let frame = restrict_to_dates(frame, dates)?;
        let frame = restrict_to_universe(frame, universe, self.universes.get(universe.name()))?;
        Ok(frame
            .sort([TRADE_DATE, CODE], SortMultipleOptions::default())
            .collect()?)
    }
}

impl DataEngine for InMemoryEngine {
    fn fetch_factor_panel(
        &self,
        universe: &Universe,
        transformer: &Transformer,
        dates: &[NaiveDate],
    ) -> Result<DataFrame> {
        let market = Self::dataset(self.market.as_ref(), "market")?;
        let factors = Self::dataset(self.factors.as_ref(), "factors")?;
        let dependencies = transformer.dependencies();
        require_columns(factors, "factors", &dependencies)?;

        let mut columns = vec![col(TRADE_DATE), col(CODE)];
        columns.extend(dependencies.iter().map(|name| col(name.as_str())));

        let raw = factors.clone().lazy().select(columns).join(
            market
                .clone()
                .lazy()
                .select([col(TRADE_DATE), col(CODE), col(IS_OPEN)]),
            [col(TRADE_DATE), col(CODE)],
            [col(TRADE_DATE), col(CODE)],
            JoinArgs::new(JoinType::Inner),
        );

        self.restrict(transformer.apply(raw), universe, dates)
    }

    fn fetch_forward_return_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        horizon: usize,
    ) -> Result<DataFrame> {
        let market = Self::dataset(self.market.as_ref(), "market")?;
        let returns = forward_returns(market, dates, horizon)?;
        self.restrict(returns.lazy(), universe, dates)
    }

    fn fetch_industry_panel(&self, universe: &Universe, dates: &[NaiveDate]) -> Result<DataFrame> {
        let industries = Self::dataset(self.industries.as_ref(), "industries")?;
        let frame = industries.clone().lazy().select([
            col(TRADE_DATE),
            col(CODE),
            col(INDUSTRY_CODE),
            col(INDUSTRY),
        ]);
        self.restrict(frame, universe, dates)
    }

    fn fetch_benchmark_panel(&self, benchmark: i64, dates: &[NaiveDate]) -> Result<DataFrame> {
        let weights = self
            .benchmarks
            .get(&benchmark)
            .ok_or_else(|| DataError::MissingData {
                dataset: format!("benchmark {benchmark}"),
                reason: "not loaded".to_string(),
            })?;

        let frame = weights
            .clone()
            .lazy()
            .select([col(TRADE_DATE), col(CODE), col(WEIGHT)]);
        Ok(restrict_to_dates(frame, dates)?
            .sort([TRADE_DATE, CODE], SortMultipleOptions::default())
            .collect()?)
    }

    fn fetch_risk_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        risk_model: RiskModel,
    ) -> Result<DataFrame> {
        let exposures = self
            .risk_exposures
            .get(&risk_model)
            .ok_or_else(|| DataError::MissingData {
                dataset: format!("risk model {risk_model}"),
                reason: "not loaded".to_string(),
            })?;
        self.restrict(exposures.clone().lazy(), universe, dates)
    }
}
