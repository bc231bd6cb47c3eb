//! Processing pipeline: pre-process, neutralize, post-process.

use crate::error::{ProcessingError, Result};
use crate::linalg::least_squares_residuals;
use crate::steps::ProcessingStep;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A transform applied independently to each walk-forward window.
///
/// Implementations must be pure: the same input always produces the same
/// output, and no state is carried from one call to the next.
pub trait CrossSectionalTransform {
    /// Transform `values` (rows × columns), optionally neutralizing against
    /// `risk_factors` (rows × exposures, row-aligned with `values`).
    fn transform(
        &self,
        values: ArrayView2<'_, f64>,
        risk_factors: Option<ArrayView2<'_, f64>>,
    ) -> Result<Array2<f64>>;
}

/// Ordered pre- and post-processing steps around risk neutralization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingPipeline {
    /// Steps applied before neutralization
    #[serde(default)]
    pub pre_process: Vec<ProcessingStep>,
    /// Steps applied after neutralization
    #[serde(default)]
    pub post_process: Vec<ProcessingStep>,
}

impl ProcessingPipeline {
    /// Create a pipeline from explicit step lists.
    pub const fn new(pre_process: Vec<ProcessingStep>, post_process: Vec<ProcessingStep>) -> Self {
        Self {
            pre_process,
            post_process,
        }
    }

    /// A pipeline that only neutralizes (when exposures are given).
    pub const fn identity() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl CrossSectionalTransform for ProcessingPipeline {
    fn transform(
        &self,
        values: ArrayView2<'_, f64>,
        risk_factors: Option<ArrayView2<'_, f64>>,
    ) -> Result<Array2<f64>> {
        factor_processing(values, &self.pre_process, risk_factors, &self.post_process)
    }
}

/// Run `pre_process`, neutralize against `risk_factors`, then run
/// `post_process`.
///
/// Risk columns whose sum over the window is zero (e.g. an industry dummy
/// with no members in the window) are dropped before the regression.
pub fn factor_processing(
    values: ArrayView2<'_, f64>,
    pre_process: &[ProcessingStep],
    risk_factors: Option<ArrayView2<'_, f64>>,
    post_process: &[ProcessingStep],
) -> Result<Array2<f64>> {
    let mut processed = values.to_owned();

    for step in pre_process {
        step.apply(&mut processed)?;
    }

    if let Some(risk) = risk_factors {
        if risk.nrows() != processed.nrows() {
            return Err(ProcessingError::DimensionMismatch {
                expected: processed.nrows(),
                actual: risk.nrows(),
                context: "risk exposures".to_string(),
            });
        }

        let active: Vec<usize> = risk
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, column)| column.sum() != 0.0)
            .map(|(i, _)| i)
            .collect();
        let design = risk.select(Axis(1), &active);
        processed = least_squares_residuals(design.view(), processed.view())?;
    }

    for step in post_process {
        if step.is_winsorize() && risk_factors.is_some() {
            warn!("{step} normally should not be applied after neutralization");
        }
        step.apply(&mut processed)?;
    }

    Ok(processed)
}
