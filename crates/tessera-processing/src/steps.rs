//! Column-wise cross-sectional transforms.
//!
//! Every step treats each column of the input as one cross-section and works
//! on it independently. Sample moments use `ddof = 1`.

use crate::error::{ProcessingError, Result};
use ndarray::{Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

const fn default_num_stds() -> f64 {
    3.0
}

/// A single pre- or post-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessingStep {
    /// Clip each column to `mean ± num_stds * std`.
    Winsorize {
        /// Width of the band in standard deviations (default: 3)
        #[serde(default = "default_num_stds")]
        num_stds: f64,
    },
    /// Rescale each column to zero mean and unit standard deviation.
    Standardize,
    /// Subtract the column mean.
    Demean,
}

impl ProcessingStep {
    /// Winsorization with the default three standard deviations.
    pub const fn winsorize() -> Self {
        Self::Winsorize {
            num_stds: default_num_stds(),
        }
    }

    /// Whether this step is a winsorization.
    pub const fn is_winsorize(&self) -> bool {
        matches!(self, Self::Winsorize { .. })
    }

    /// Apply the step in place.
    pub fn apply(&self, values: &mut Array2<f64>) -> Result<()> {
        match *self {
            Self::Winsorize { num_stds } => winsorize_normal(values, num_stds),
            Self::Standardize => {
                standardize(values);
                Ok(())
            }
            Self::Demean => {
                demean(values);
                Ok(())
            }
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winsorize { num_stds } => write!(f, "winsorize({num_stds})"),
            Self::Standardize => write!(f, "standardize"),
            Self::Demean => write!(f, "demean"),
        }
    }
}

/// Sample mean and standard deviation of a column. The deviation is `None`
/// for fewer than two observations.
fn moments(column: &ArrayViewMut1<'_, f64>) -> (f64, Option<f64>) {
    let n = column.len();
    if n == 0 {
        return (0.0, None);
    }
    let mean = column.sum() / n as f64;
    if n < 2 {
        return (mean, None);
    }
    let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, Some(var.sqrt()))
}

/// Clip every column to `mean ± num_stds * std`.
///
/// Columns with fewer than two rows are left unchanged.
pub fn winsorize_normal(values: &mut Array2<f64>, num_stds: f64) -> Result<()> {
    if num_stds.is_nan() || num_stds <= 0.0 {
        return Err(ProcessingError::InvalidParameter(format!(
            "winsorize num_stds must be positive, got {num_stds}"
        )));
    }

    for mut column in values.axis_iter_mut(Axis(1)) {
        let (mean, std) = moments(&column);
        if let Some(std) = std {
            let lower = mean - num_stds * std;
            let upper = mean + num_stds * std;
            column.mapv_inplace(|v| v.clamp(lower, upper));
        }
    }
    Ok(())
}

/// Z-score every column. A column with no dispersion becomes all zeros.
pub fn standardize(values: &mut Array2<f64>) {
    for mut column in values.axis_iter_mut(Axis(1)) {
        let (mean, std) = moments(&column);
        match std {
            Some(std) if std > 0.0 => column.mapv_inplace(|v| (v - mean) / std),
            _ => column.mapv_inplace(|v| v - mean),
        }
    }
}

/// Subtract the column mean from every column.
pub fn demean(values: &mut Array2<f64>) {
    for mut column in values.axis_iter_mut(Axis(1)) {
        let (mean, _) = moments(&column);
        column.mapv_inplace(|v| v - mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_standardize_unit_variance() {
        let mut values = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        standardize(&mut values);

        for column in values.axis_iter(Axis(1)) {
            let mean = column.sum() / 4.0;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_standardize_constant_column() {
        let mut values = array![[5.0], [5.0], [5.0]];
        standardize(&mut values);
        assert!(values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_winsorize_clips_outlier() {
        let mut values = Array2::from_shape_vec(
            (11, 1),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 100.0],
        )
        .unwrap();
        winsorize_normal(&mut values, 1.0).unwrap();

        let mean: f64 = 100.0 / 11.0;
        let std = ((10.0 * mean * mean + (100.0 - mean).powi(2)) / 10.0).sqrt();
        assert_relative_eq!(values[[10, 0]], mean + std, epsilon = 1e-9);
        assert_relative_eq!(values[[0, 0]], 0.0);
    }

    #[test]
    fn test_winsorize_single_row_untouched() {
        let mut values = array![[42.0, -3.0]];
        winsorize_normal(&mut values, 3.0).unwrap();
        assert_eq!(values, array![[42.0, -3.0]]);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn test_winsorize_rejects_bad_width(#[case] num_stds: f64) {
        let mut values = array![[1.0], [2.0]];
        assert!(winsorize_normal(&mut values, num_stds).is_err());
    }

    #[test]
    fn test_demean() {
        let mut values = array![[1.0], [2.0], [6.0]];
        demean(&mut values);
        assert_eq!(values, array![[-2.0], [-1.0], [3.0]]);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut values = Array2::<f64>::zeros((0, 3));
        ProcessingStep::Standardize.apply(&mut values).unwrap();
        ProcessingStep::winsorize().apply(&mut values).unwrap();
        assert_eq!(values.dim(), (0, 3));
    }

    #[test]
    fn test_step_serde() {
        let steps: Vec<ProcessingStep> =
            serde_json::from_str(r#"[{"kind":"winsorize"},{"kind":"standardize"}]"#).unwrap();
        assert_eq!(steps, vec![ProcessingStep::winsorize(), ProcessingStep::Standardize]);
        assert_eq!(steps[0].to_string(), "winsorize(3)");
    }
}
