//! Walk-forward batching.
//!
//! For schedule dates `d[0] < d[1] < … < d[n-1]` and a batch size `b`, every
//! key `end = d[i + b]` gets
//!
//! - a train bucket: rows labelled in `[d[i], end)`, transformed as one
//!   window;
//! - a predict bucket: rows labelled in `(d[i], end]`, transformed as one
//!   window, then cut down to the rows labelled `end`.
//!
//! Windows are transformed independently, so statistics fitted on a train
//! window never see the predict date and vice versa.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView2, Axis};
use serde::Serialize;
use std::collections::BTreeMap;
use tessera_processing::CrossSectionalTransform;
use tracing::debug;

/// Buckets keyed by the trailing schedule date of each window.
pub type Buckets = BTreeMap<NaiveDate, Array2<f64>>;

/// Output of [`batch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkForwardBuckets {
    /// Train features
    pub train_x: Buckets,
    /// Train targets
    pub train_y: Buckets,
    /// Predict features
    pub predict_x: Buckets,
    /// Predict targets, absent for keys whose predict window had no rows
    pub predict_y: Buckets,
}

impl WalkForwardBuckets {
    /// Number of windows produced.
    pub fn len(&self) -> usize {
        self.train_x.len()
    }

    /// Whether no window could be formed.
    pub fn is_empty(&self) -> bool {
        self.train_x.is_empty()
    }

    /// Per-window row counts.
    pub fn summary(&self) -> Vec<BucketSummary> {
        summarize(&self.train_x, &self.predict_x, &self.predict_y)
    }
}

/// Row counts for every train key.
pub fn summarize(train_x: &Buckets, predict_x: &Buckets, predict_y: &Buckets) -> Vec<BucketSummary> {
    train_x
        .iter()
        .map(|(date, train)| BucketSummary {
            date: *date,
            train_rows: train.nrows(),
            predict_rows: predict_x.get(date).map_or(0, Array2::nrows),
            has_predict_target: predict_y.contains_key(date),
        })
        .collect()
}

/// Row counts of one walk-forward window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    /// Window key
    pub date: NaiveDate,
    /// Rows in the train window
    pub train_rows: usize,
    /// Rows in the predict bucket
    pub predict_rows: usize,
    /// Whether a predict target bucket exists
    pub has_predict_target: bool,
}

fn check_rows(expected: usize, actual: usize, context: &str) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch {
            expected,
            actual,
            context: context.to_string(),
        });
    }
    Ok(())
}

fn rows_where(labels: &[NaiveDate], keep: impl Fn(NaiveDate) -> bool) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| keep(**label))
        .map(|(i, _)| i)
        .collect()
}

/// Slice `features` / `targets` into walk-forward windows.
///
/// `date_labels` gives each row's date; `risk_exposures`, when present, is
/// row-aligned with the features and passed to `transform` for
/// neutralization. All inputs are checked for alignment before any window is
/// processed.
pub fn batch<T>(
    features: ArrayView2<'_, f64>,
    targets: ArrayView2<'_, f64>,
    schedule_dates: &[NaiveDate],
    date_labels: &[NaiveDate],
    batch_size: usize,
    risk_exposures: Option<ArrayView2<'_, f64>>,
    transform: &T,
) -> Result<WalkForwardBuckets>
where
    T: CrossSectionalTransform + ?Sized,
{
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    let rows = features.nrows();
    check_rows(rows, targets.nrows(), "targets")?;
    check_rows(rows, date_labels.len(), "date labels")?;
    if let Some(risk) = risk_exposures {
        check_rows(rows, risk.nrows(), "risk exposures")?;
    }
    if let Some(pair) = schedule_dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::UnorderedSchedule(pair[1], pair[0]));
    }

    let mut buckets = WalkForwardBuckets::default();
    if batch_size >= schedule_dates.len() {
        return Ok(buckets);
    }

    for (i, &start) in schedule_dates[..schedule_dates.len() - batch_size].iter().enumerate() {
        let end = schedule_dates[i + batch_size];

        let index = rows_where(date_labels, |label| start <= label && label < end);
        let risk = risk_exposures.map(|r| r.select(Axis(0), &index));
        let risk = risk.as_ref().map(Array2::view);

        buckets.train_x.insert(
            end,
            transform.transform(features.select(Axis(0), &index).view(), risk)?,
        );
        buckets.train_y.insert(
            end,
            transform.transform(targets.select(Axis(0), &index).view(), risk)?,
        );
        let train_rows = index.len();

        let index = rows_where(date_labels, |label| start < label && label <= end);
        let at_end: Vec<usize> = index
            .iter()
            .enumerate()
            .filter(|(_, row)| date_labels[**row] == end)
            .map(|(pos, _)| pos)
            .collect();
        let risk = risk_exposures.map(|r| r.select(Axis(0), &index));
        let risk = risk.as_ref().map(Array2::view);

        let predict_x = transform.transform(features.select(Axis(0), &index).view(), risk)?;
        buckets.predict_x.insert(end, predict_x.select(Axis(0), &at_end));

        if !index.is_empty() {
            let predict_y = transform.transform(targets.select(Axis(0), &index).view(), risk)?;
            buckets.predict_y.insert(end, predict_y.select(Axis(0), &at_end));
        }

        debug!(
            "Window {start} -> {end}: {train_rows} train rows, {} predict rows",
            at_end.len()
        );
    }

    Ok(buckets)
}
