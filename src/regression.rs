//! Ordinary-least-squares line fit over (rate, drive) samples.
//!
//! The independent variable is the measured rate and the dependent variable
//! is the drive that produced it, so applying the fit to a target rate yields
//! the feedforward drive directly — no inversion step.

use thiserror::Error;

/// Errors from fit construction.
#[derive(Debug, Error)]
pub enum RegressionError {
    /// All x-values identical (or fewer than two points): the normal-equation
    /// denominator is zero and no line is defined.
    #[error("degenerate sample set: {points} point(s) with zero x-variance")]
    Degenerate { points: usize },

    /// Bulk constructor given columns of different lengths.
    #[error("mismatched number of arguments: {x_len} rates, {y_len} drives")]
    MismatchedLengths { x_len: usize, y_len: usize },
}

/// A fitted line `y = intercept + slope * x` with its residual error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Sum of squared residuals — a raw sum, not a normalized R².
    pub sse: f64,
}

impl LinearFit {
    /// Fit a line to `(x, y)` points by ordinary least squares.
    ///
    /// Callers must supply points in a fixed order (the sample store iterates
    /// ascending bin index) so the floating-point summation is deterministic.
    pub fn fit<I>(points: I) -> Result<Self, RegressionError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let points: Vec<(f64, f64)> = points.into_iter().collect();
        let n = points.len() as f64;

        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xx = 0.0;
        let mut sum_xy = 0.0;
        for &(x, y) in &points {
            sum_x += x;
            sum_y += y;
            sum_xx += x * x;
            sum_xy += x * y;
        }

        let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
        let intercept = (sum_y - slope * sum_x) / n;

        if !slope.is_finite() || !intercept.is_finite() {
            return Err(RegressionError::Degenerate {
                points: points.len(),
            });
        }

        let mut fit = Self {
            slope,
            intercept,
            sse: 0.0,
        };
        fit.sse = points
            .iter()
            .map(|&(x, y)| {
                let r = y - fit.apply(x);
                r * r
            })
            .sum();
        Ok(fit)
    }

    /// Bulk constructor from parallel rate/drive columns.
    ///
    /// Rejects mismatched lengths before fitting; this is the only
    /// construction-time validation error in the crate.
    pub fn from_columns(x: &[f64], y: &[f64]) -> Result<Self, RegressionError> {
        if x.len() != y.len() {
            return Err(RegressionError::MismatchedLengths {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        Self::fit(x.iter().copied().zip(y.iter().copied()))
    }

    /// Evaluate the line at `x`. Pure and total.
    pub fn apply(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

impl std::fmt::Display for LinearFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u = {:.5} + {:.5} * x", self.intercept, self.slope)
    }
}
