//! Forward return computation.
//!
//! The forward return at a rebalance date `t` with horizon `h` compounds the
//! daily returns of the `h + 1` trading days strictly after `t`:
//!
//! dx(t) = exp(Σ_{k=1..h+1} ln(1 + r_{t+k})) - 1
//!
//! so with `h = horizon(frequency)` the window ends on the day before the
//! next rebalance. Trading days are the instrument's own rows in the daily
//! frame; a date whose forward window runs past the data, or contains a
//! missing return, gets no `dx`.

use crate::error::Result;
use crate::frame::{CHG_PCT, CODE, DX, TRADE_DATE, date_series, date_values, require_columns};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Compute `dx` for every instrument at each of `dates`.
///
/// `daily` must carry `trade_date`, `code` and `chg_pct`. Returns a frame
/// with `trade_date`, `code`, `dx`, sorted by `(trade_date, code)`.
pub fn forward_returns(daily: &DataFrame, dates: &[NaiveDate], horizon: usize) -> Result<DataFrame> {
    require_columns(daily, "daily returns", &[TRADE_DATE, CODE, CHG_PCT])?;

    let trade_dates = date_values(daily, TRADE_DATE)?;
    let codes = daily.column(CODE)?.str()?;
    let changes = daily.column(CHG_PCT)?.cast(&DataType::Float64)?;
    let changes = changes.f64()?;

    let mut series: BTreeMap<&str, Vec<(NaiveDate, Option<f64>)>> = BTreeMap::new();
    for (i, date) in trade_dates.iter().enumerate() {
        if let Some(code) = codes.get(i) {
            series.entry(code).or_default().push((*date, changes.get(i)));
        }
    }

    let wanted: HashSet<NaiveDate> = dates.iter().copied().collect();
    let window = horizon + 1;

    let mut rows: Vec<(NaiveDate, String, f64)> = Vec::new();
    for (code, history) in &mut series {
        history.sort_by_key(|(date, _)| *date);
        for (t, (date, _)) in history.iter().enumerate() {
            if !wanted.contains(date) || t + window >= history.len() {
                continue;
            }
            let log_sum: Option<f64> = history[t + 1..=t + window]
                .iter()
                .map(|(_, r)| r.map(|r| (1.0 + r).ln()))
                .sum();
            if let Some(log_sum) = log_sum {
                rows.push((*date, (*code).to_string(), log_sum.exp() - 1.0));
            }
        }
    }
    rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let out_dates: Vec<NaiveDate> = rows.iter().map(|r| r.0).collect();
    let out_codes: Vec<String> = rows.iter().map(|r| r.1.clone()).collect();
    let out_dx: Vec<f64> = rows.iter().map(|r| r.2).collect();

    Ok(DataFrame::new(vec![
        date_series(TRADE_DATE, &out_dates).into(),
        Column::new(CODE.into(), out_codes),
        Column::new(DX.into(), out_dx),
    ])?)
}
