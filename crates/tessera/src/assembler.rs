//! Panel assembly.
//!
//! Joins the per-date, per-instrument panels served by a data engine into one
//! aligned frame, in a fixed order:
//!
//! 1. factors ⋈ forward returns (inner), dropping rows with any missing
//!    factor value or `dx`
//! 2. ⟕ benchmark weights (left), missing weights filled with 0
//! 3. ⋈ industry classification (inner)
//! 4. ⋈ risk exposures (inner), restricted to the incremental risk names
//!
//! and sorts the result by `(trade_date, code)`. Features and targets are
//! projections of that single frame, so they are row-aligned. Every source
//! must hold each `(trade_date, code)` key at most once, otherwise joins would
//! repeat rows.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashSet;
use tessera_data::frame::{CODE, DX, INDUSTRY, INDUSTRY_CODE, IS_OPEN, TRADE_DATE, WEIGHT, date_values};
use tracing::debug;

/// Raw panels to join. Every frame is keyed by `(trade_date, code)`.
#[derive(Debug, Clone)]
pub struct PanelSources {
    /// `isOpen` plus one column per factor
    pub factors: DataFrame,
    /// `dx`
    pub returns: DataFrame,
    /// `weight`
    pub benchmark: DataFrame,
    /// `industry_code`, `industry`
    pub industry: DataFrame,
    /// One column per risk factor, when neutralization is requested
    pub risk: Option<DataFrame>,
}

/// Requested risk names that are not already factor names, deduplicated, in
/// request order.
pub fn incremental_risk_names(risk_names: &[String], factor_names: &[String]) -> Vec<String> {
    let factors: HashSet<&str> = factor_names.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    risk_names
        .iter()
        .filter(|name| !factors.contains(name.as_str()) && seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// `names` with duplicates removed, in first-seen order.
pub fn unique_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Filter keeping rows where every column in `names` is neither null nor NaN.
fn complete_rows<S: AsRef<str>>(names: &[S]) -> Expr {
    names.iter().fold(lit(true), |acc, name| {
        let column = col(name.as_ref());
        acc.and(column.clone().is_not_null()).and(column.is_not_nan())
    })
}

fn keys() -> [Expr; 2] {
    [col(TRADE_DATE), col(CODE)]
}

fn non_empty(frame: DataFrame, stage: &str) -> Result<DataFrame> {
    debug!("{stage} join left {} rows", frame.height());
    if frame.height() == 0 {
        return Err(Error::MissingJoinKey {
            stage: stage.to_string(),
        });
    }
    Ok(frame)
}

/// Fail with [`Error::DuplicateKey`] if any `(trade_date, code)` key repeats.
fn ensure_unique_keys(frame: &DataFrame, panel: &str) -> Result<()> {
    let repeated = frame
        .clone()
        .lazy()
        .group_by(keys())
        .agg([len().alias("rows")])
        .filter(col("rows").gt(lit(1)))
        .sort([TRADE_DATE, CODE], SortMultipleOptions::default())
        .limit(1)
        .collect()?;
    if repeated.height() == 0 {
        return Ok(());
    }

    let trade_date = date_values(&repeated, TRADE_DATE)?[0];
    let code = repeated.column(CODE)?.str()?.get(0).unwrap_or_default().to_string();
    Err(Error::DuplicateKey {
        panel: panel.to_string(),
        trade_date,
        code,
    })
}

/// Join `sources` into an aligned panel.
///
/// `factor_names` are the feature columns of the factor panel; `risk_names`
/// are the requested neutralization factors (empty for none).
pub fn assemble(sources: PanelSources, factor_names: &[String], risk_names: &[String]) -> Result<AssembledPanel> {
    ensure_unique_keys(&sources.factors, "factor")?;
    ensure_unique_keys(&sources.returns, "return")?;
    ensure_unique_keys(&sources.benchmark, "benchmark")?;
    ensure_unique_keys(&sources.industry, "industry")?;

    let mut required: Vec<&str> = factor_names.iter().map(String::as_str).collect();
    required.push(DX);

    let factors = sources.factors.lazy().with_columns(
        factor_names
            .iter()
            .map(|name| col(name.as_str()).cast(DataType::Float64))
            .collect::<Vec<_>>(),
    );
    let returns = sources
        .returns
        .lazy()
        .select([col(TRADE_DATE), col(CODE), col(DX).cast(DataType::Float64)]);

    let frame = factors
        .join(returns, keys(), keys(), JoinArgs::new(JoinType::Inner))
        .filter(complete_rows(&required))
        .collect()?;
    let frame = non_empty(frame, "factor/return")?;

    let benchmark = sources
        .benchmark
        .lazy()
        .select([col(TRADE_DATE), col(CODE), col(WEIGHT).cast(DataType::Float64)]);
    let frame = frame
        .lazy()
        .join(benchmark, keys(), keys(), JoinArgs::new(JoinType::Left))
        .with_column(col(WEIGHT).fill_null(lit(0.0)))
        .collect()?;
    let frame = non_empty(frame, "benchmark")?;

    let industry = sources
        .industry
        .lazy()
        .select([col(TRADE_DATE), col(CODE), col(INDUSTRY_CODE), col(INDUSTRY)]);
    let frame = frame
        .lazy()
        .join(industry, keys(), keys(), JoinArgs::new(JoinType::Inner))
        .filter(col(INDUSTRY_CODE).is_not_null().and(col(INDUSTRY).is_not_null()))
        .collect()?;
    let mut frame = non_empty(frame, "industry")?;

    let incremental = incremental_risk_names(risk_names, factor_names);
    if let Some(risk) = sources.risk.filter(|_| !risk_names.is_empty()) {
        ensure_unique_keys(&risk, "risk")?;
        let mut columns = keys().to_vec();
        columns.extend(
            incremental
                .iter()
                .map(|name| col(name.as_str()).cast(DataType::Float64)),
        );
        let risk = risk.lazy().select(columns).filter(complete_rows(&incremental));
        frame = non_empty(
            frame
                .lazy()
                .join(risk, keys(), keys(), JoinArgs::new(JoinType::Inner))
                .collect()?,
            "risk",
        )?;
    }

    let frame = frame.sort([TRADE_DATE, CODE], SortMultipleOptions::default())?;

    Ok(AssembledPanel {
        frame,
        factor_names: factor_names.to_vec(),
        risk_names: incremental,
    })
}

/// The joined panel.
#[derive(Debug, Clone)]
pub struct AssembledPanel {
    frame: DataFrame,
    factor_names: Vec<String>,
    risk_names: Vec<String>,
}

impl AssembledPanel {
    /// The full joined frame, sorted by `(trade_date, code)`.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Factor (feature) names.
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    /// Risk names joined in addition to the factors.
    pub fn incremental_risk_names(&self) -> &[String] {
        &self.risk_names
    }

    /// `trade_date`, `code`, `dx`.
    pub fn targets(&self) -> Result<DataFrame> {
        Ok(self.frame.select([TRADE_DATE, CODE, DX])?)
    }

    /// `trade_date`, `code`, `weight`, `isOpen`, `industry_code`, `industry`,
    /// the factors, then the incremental risk names.
    pub fn features(&self) -> Result<DataFrame> {
        let mut columns: Vec<&str> = vec![TRADE_DATE, CODE, WEIGHT, IS_OPEN, INDUSTRY_CODE, INDUSTRY];
        columns.extend(self.factor_names.iter().map(String::as_str));
        columns.extend(self.risk_names.iter().map(String::as_str));
        Ok(self.frame.select(columns)?)
    }

    /// Row labels for windowing.
    pub fn date_labels(&self) -> Result<Vec<NaiveDate>> {
        Ok(date_values(&self.frame, TRADE_DATE)?)
    }

    /// Factor values as a `rows × factors` array.
    pub fn feature_array(&self) -> Result<Array2<f64>> {
        self.array(&self.factor_names)
    }

    /// Forward returns as a `rows × 1` array.
    pub fn target_array(&self) -> Result<Array2<f64>> {
        self.array(&[DX])
    }

    /// Any numeric columns of the joined frame as a `rows × columns` array.
    ///
    /// Nulls become NaN.
    pub fn array<S: AsRef<str>>(&self, columns: &[S]) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((self.frame.height(), columns.len()));
        for (j, name) in columns.iter().enumerate() {
            let values = self.frame.column(name.as_ref())?.cast(&DataType::Float64)?;
            for (i, value) in values.f64()?.into_iter().enumerate() {
                out[[i, j]] = value.unwrap_or(f64::NAN);
            }
        }
        Ok(out)
    }
}
