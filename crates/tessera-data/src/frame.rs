//! Column names and small helpers shared by every panel frame.
//!
//! Every panel is keyed by `(trade_date, code)`: `trade_date` is a polars
//! `Date` column and `code` a string column.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Trading date key column.
pub const TRADE_DATE: &str = "trade_date";
/// Instrument code key column.
pub const CODE: &str = "code";
/// Forward return column.
pub const DX: &str = "dx";
/// Benchmark weight column.
pub const WEIGHT: &str = "weight";
/// Tradability flag column.
pub const IS_OPEN: &str = "isOpen";
/// Industry code column.
pub const INDUSTRY_CODE: &str = "industry_code";
/// Industry name column.
pub const INDUSTRY: &str = "industry";
/// Daily percentage change column of the market frame.
pub const CHG_PCT: &str = "chg_pct";

/// Build a polars `Date` series from chrono dates.
pub fn date_series(name: &str, dates: &[NaiveDate]) -> Series {
    Series::new(name.into(), dates)
}

/// Read a `Date` column back into chrono dates. Nulls are an error.
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    df.column(name)?
        .date()?
        .as_date_iter()
        .map(|date| date.ok_or_else(|| DataError::Parse(format!("Null date in {name}"))))
        .collect()
}

/// Single-column frame of the distinct `dates`, named [`TRADE_DATE`].
pub fn dates_frame(dates: &[NaiveDate]) -> PolarsResult<DataFrame> {
    let mut unique = dates.to_vec();
    unique.sort_unstable();
    unique.dedup();
    DataFrame::new(vec![date_series(TRADE_DATE, &unique).into()])
}

/// Keep only rows whose `trade_date` is one of `dates`.
pub fn restrict_to_dates(frame: LazyFrame, dates: &[NaiveDate]) -> PolarsResult<LazyFrame> {
    Ok(frame.join(
        dates_frame(dates)?.lazy(),
        [col(TRADE_DATE)],
        [col(TRADE_DATE)],
        JoinArgs::new(JoinType::Inner),
    ))
}

/// Fail with [`DataError::MissingData`] unless `df` has every column in `names`.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, dataset: &str, names: &[S]) -> Result<()> {
    let present = df.get_column_names_str();
    let missing: Vec<&str> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !present.contains(name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingData {
            dataset: dataset.to_string(),
            reason: format!("missing columns: {}", missing.join(", ")),
        })
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("Invalid date {value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_date_column_round_trip() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let df = DataFrame::new(vec![date_series(TRADE_DATE, &dates).into()]).unwrap();
        assert_eq!(df.column(TRADE_DATE).unwrap().dtype(), &DataType::Date);
        assert_eq!(date_values(&df, TRADE_DATE).unwrap(), dates);
    }

    #[test]
    fn test_null_date_is_an_error() {
        let dates = Series::new(TRADE_DATE.into(), &[Some(d(2024, 1, 2)), None]);
        let df = DataFrame::new(vec![dates.into()]).unwrap();
        assert!(matches!(date_values(&df, TRADE_DATE), Err(DataError::Parse(_))));
    }

    #[test]
    fn test_restrict_to_dates() {
        let df = DataFrame::new(vec![
            date_series(TRADE_DATE, &[d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)]).into(),
            Column::new(CODE.into(), vec!["A", "A", "A"]),
        ])
        .unwrap();

        let kept = restrict_to_dates(df.lazy(), &[d(2024, 1, 4), d(2024, 1, 2), d(2024, 1, 2)])
            .unwrap()
            .sort([TRADE_DATE], SortMultipleOptions::default())
            .collect()
            .unwrap();
        assert_eq!(date_values(&kept, TRADE_DATE).unwrap(), vec![d(2024, 1, 2), d(2024, 1, 4)]);
    }

    #[test]
    fn test_require_columns() {
        let df = DataFrame::new(vec![Column::new(CODE.into(), vec!["A"])]).unwrap();
        assert!(require_columns(&df, "test", &[CODE]).is_ok());
        let err = require_columns(&df, "test", &[CODE, DX]).unwrap_err();
        assert!(err.to_string().contains("dx"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-01").unwrap(), d(2024, 3, 1));
        assert!(parse_date("03/01/2024").is_err());
    }
}
