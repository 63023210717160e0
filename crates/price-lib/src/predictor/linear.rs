//! Ordinary least squares regression with intercept

use super::{check_width, Regressor};
use crate::error::{PredictorError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Relative ridge term added to the normal equations so that collinear
/// features still yield a solution
const RIDGE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model with known parameters
    pub fn from_parts(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let (n, p) = x.dim();
        if n == 0 {
            return Err(PredictorError::InsufficientData { needed: 1, got: 0 });
        }
        if y.len() != n {
            return Err(PredictorError::InvalidData(format!(
                "{} samples but {} targets",
                n,
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(p));
        let y_mean = y.sum() / n as f64;
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let mut gram = xc.t().dot(&xc);
        let rhs = xc.t().dot(&yc);

        let trace: f64 = gram.diag().sum();
        let ridge = RIDGE_EPSILON * trace.max(1.0);
        for i in 0..p {
            gram[[i, i]] += ridge;
        }

        let mut a: Vec<Vec<f64>> = gram.outer_iter().map(|r| r.to_vec()).collect();
        let mut b = rhs.to_vec();
        let coefficients = solve(&mut a, &mut b);

        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        self.coefficients = coefficients;
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features(), x.ncols())?;
        let coef = ArrayView1::from(&self.coefficients[..]);
        Ok(x.dot(&coef) + self.intercept)
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

/// Gaussian elimination with partial pivoting. Variables whose pivot
/// vanishes get a zero coefficient.
fn solve(a: &mut [Vec<f64>], b: &mut [f64]) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            continue;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        if a[row][row].abs() < f64::MIN_POSITIVE {
            continue;
        }
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    solution
}
