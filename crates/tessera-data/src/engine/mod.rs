//! Panel data engines.
//!
//! A [`DataEngine`] serves the five point-in-time panels the pipeline joins.
//! Every returned frame is keyed by `(trade_date, code)` and restricted to
//! the requested dates (and universe, where one is given).

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryEngine;
pub use sqlite::{SqliteEngine, SqliteStats};

use crate::error::{DataError, Result};
use crate::frame::{CODE, TRADE_DATE};
use crate::risk_model::RiskModel;
use crate::transformer::Transformer;
use crate::universe::Universe;
use chrono::NaiveDate;
use polars::prelude::*;

/// Source of factor, return, industry, benchmark and risk panels.
pub trait DataEngine {
    /// Factor values: `trade_date`, `code`, `isOpen`, then one column per
    /// factor in `transformer` order.
    fn fetch_factor_panel(
        &self,
        universe: &Universe,
        transformer: &Transformer,
        dates: &[NaiveDate],
    ) -> Result<DataFrame>;

    /// Forward returns over `horizon + 1` trading days: `trade_date`, `code`, `dx`.
    fn fetch_forward_return_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        horizon: usize,
    ) -> Result<DataFrame>;

    /// Industry classification: `trade_date`, `code`, `industry_code`, `industry`.
    fn fetch_industry_panel(&self, universe: &Universe, dates: &[NaiveDate]) -> Result<DataFrame>;

    /// Benchmark constituent weights: `trade_date`, `code`, `weight`.
    fn fetch_benchmark_panel(&self, benchmark: i64, dates: &[NaiveDate]) -> Result<DataFrame>;

    /// Risk-model exposures: `trade_date`, `code`, then one column per risk factor.
    fn fetch_risk_panel(
        &self,
        universe: &Universe,
        dates: &[NaiveDate],
        risk_model: RiskModel,
    ) -> Result<DataFrame>;
}

/// Restrict `frame` to the members of `universe`.
///
/// Static universes filter on `code`; named universes join against the
/// point-in-time `members` frame (`trade_date`, `code`).
pub(crate) fn restrict_to_universe(
    frame: LazyFrame,
    universe: &Universe,
    members: Option<&DataFrame>,
) -> Result<LazyFrame> {
    if let Some(codes) = universe.codes() {
        let codes: Vec<&str> = codes.iter().map(String::as_str).collect();
        let code_frame = DataFrame::new(vec![Column::new(CODE.into(), codes)])?;
        return Ok(frame.join(
            code_frame.lazy(),
            [col(CODE)],
            [col(CODE)],
            JoinArgs::new(JoinType::Inner),
        ));
    }

    let members = members.ok_or_else(|| DataError::UnknownUniverse(universe.name().to_string()))?;
    Ok(frame.join(
        members
            .clone()
            .lazy()
            .select([col(TRADE_DATE), col(CODE)])
            .unique(None, UniqueKeepStrategy::First),
        [col(TRADE_DATE), col(CODE)],
        [col(TRADE_DATE), col(CODE)],
        JoinArgs::new(JoinType::Inner),
    ))
}
