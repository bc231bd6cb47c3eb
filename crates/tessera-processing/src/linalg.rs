//! Least-squares residuals used by neutralization.
//!
//! Risk neutralization regresses a window of factor values on the window's
//! risk exposures and keeps the residuals. The design is factored directly
//! with Householder QR and column pivoting, after scaling every column to
//! unit norm, so raw exposures of very different magnitude sit next to 0/1
//! industry dummies without losing directions. Columns whose remaining norm
//! falls below [`RANK_TOLERANCE`] are linearly dependent on the ones already
//! taken (a constant next to a full set of dummies) and are skipped.
//!
//! Residuals are the projection onto the orthogonal complement of the column
//! space, which does not depend on column scaling or on the least-squares
//! solution chosen.

use crate::error::{ProcessingError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, s};

/// Remaining norm of a unit-scaled column below which it is treated as
/// dependent.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Orthogonal basis of a design's column space, held as Householder
/// reflectors.
#[derive(Debug, Clone)]
pub struct ColumnSpace {
    /// `reflectors[k]` is a unit vector acting on rows `k..`
    reflectors: Vec<Array1<f64>>,
    rows: usize,
}

impl ColumnSpace {
    /// Factor `x` with pivoted Householder QR.
    pub fn new(x: ArrayView2<'_, f64>) -> Self {
        let (rows, cols) = x.dim();
        let mut a = equilibrate(x);
        let mut reflectors = Vec::with_capacity(rows.min(cols));

        for k in 0..rows.min(cols) {
            let Some((pivot, norm)) = largest_remaining_column(a.view(), k) else {
                break;
            };
            if norm <= RANK_TOLERANCE {
                break;
            }
            if pivot != k {
                for i in 0..rows {
                    a.swap([i, k], [i, pivot]);
                }
            }

            let v = householder(a.slice(s![k.., k]));
            reflect(v.view(), a.slice_mut(s![k.., k..]));
            reflectors.push(v);
        }

        Self { reflectors, rows }
    }

    /// Dimension of the column space.
    pub fn rank(&self) -> usize {
        self.reflectors.len()
    }

    /// Component of every column of `y` orthogonal to the column space.
    pub fn residuals(&self, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if y.nrows() != self.rows {
            return Err(ProcessingError::DimensionMismatch {
                expected: self.rows,
                actual: y.nrows(),
                context: "regressand".to_string(),
            });
        }

        // Qᵀy, drop the leading rank rows, then map back with Q
        let mut out = y.to_owned();
        for (k, v) in self.reflectors.iter().enumerate() {
            reflect(v.view(), out.slice_mut(s![k.., ..]));
        }
        out.slice_mut(s![..self.rank(), ..]).fill(0.0);
        for (k, v) in self.reflectors.iter().enumerate().rev() {
            reflect(v.view(), out.slice_mut(s![k.., ..]));
        }
        Ok(out)
    }
}

/// Residuals of the least-squares regression of every column of `y` on `x`.
///
/// No intercept is added: callers that want one include a constant column in
/// `x`.
pub fn least_squares_residuals(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    if x.nrows() != y.nrows() {
        return Err(ProcessingError::DimensionMismatch {
            expected: y.nrows(),
            actual: x.nrows(),
            context: "regressors".to_string(),
        });
    }
    if x.ncols() == 0 || x.nrows() == 0 {
        return Ok(y.to_owned());
    }

    ColumnSpace::new(x).residuals(y)
}

/// Copy of `x` with every non-zero column scaled to unit norm.
fn equilibrate(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut a = x.to_owned();
    for mut column in a.axis_iter_mut(Axis(1)) {
        let norm = column.dot(&column).sqrt();
        if norm > 0.0 {
            column.mapv_inplace(|v| v / norm);
        }
    }
    a
}

/// Column in `k..` with the largest norm over rows `k..`.
fn largest_remaining_column(a: ArrayView2<'_, f64>, k: usize) -> Option<(usize, f64)> {
    let tail = a.slice(s![k.., k..]);
    tail.axis_iter(Axis(1))
        .map(|column| column.dot(&column).sqrt())
        .enumerate()
        .filter(|(_, norm)| norm.is_finite())
        .max_by(|l, r| l.1.total_cmp(&r.1))
        .map(|(offset, norm)| (k + offset, norm))
}

/// Unit vector `v` such that `(I - 2vvᵀ) c` is a multiple of the first axis.
fn householder(c: ArrayView1<'_, f64>) -> Array1<f64> {
    let norm = c.dot(&c).sqrt();
    let mut v = c.to_owned();
    // Sign chosen to avoid cancellation
    v[0] += if c[0] >= 0.0 { norm } else { -norm };
    let v_norm = v.dot(&v).sqrt();
    if v_norm > 0.0 {
        v.mapv_inplace(|x| x / v_norm);
    }
    v
}

/// Apply `I - 2vvᵀ` to every column of `block`.
fn reflect(v: ArrayView1<'_, f64>, mut block: ArrayViewMut2<'_, f64>) {
    for mut column in block.axis_iter_mut(Axis(1)) {
        let d = 2.0 * v.dot(&column);
        column.scaled_add(-d, &v);
    }
}
