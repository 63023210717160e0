//! Feature alignment, imputation and scaling
//!
//! Aligns an input table to a fixed feature schema, fills missing cells with
//! per-column medians and applies a standard (z-score) scaling transform.

use crate::dataset::Table;
use crate::error::{PredictorError, Result};
use crate::models::FeatureSchema;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Where imputation medians come from when transforming new data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputePolicy {
    /// Reuse the medians learned when the scaler was fitted
    #[default]
    TrainingMedian,
    /// Recompute medians from whichever batch is being transformed
    BatchMedian,
}

/// Fitted per-feature scaling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: Vec<f64>,
    /// Population standard deviation; zero-variance columns are stored as 1.0
    pub scale: Vec<f64>,
    /// Training-time medians used to impute missing cells
    #[serde(default)]
    pub medians: Vec<f64>,
    #[serde(default)]
    pub policy: ImputePolicy,
}

impl ScalerState {
    /// Scaler state with explicit parameters. Medians default to the means.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        let medians = mean.clone();
        Self {
            mean,
            scale,
            medians,
            policy: ImputePolicy::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    fn is_consistent(&self) -> bool {
        self.scale.len() == self.mean.len()
            && (self.medians.is_empty() || self.medians.len() == self.mean.len())
    }
}

/// Whether to learn scaling parameters or apply existing ones
#[derive(Debug, Clone, Copy)]
pub enum ScaleMode<'a> {
    Fit,
    Transform(&'a ScalerState),
}

/// Aligns, imputes and scales tables against a feature schema
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    policy: ImputePolicy,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ImputePolicy) -> Self {
        Self { policy }
    }

    /// Align `table` to `schema`, impute missing cells and scale.
    ///
    /// In [`ScaleMode::Fit`] the returned state is freshly computed from
    /// `table`; in [`ScaleMode::Transform`] it is a copy of the supplied one.
    pub fn align_and_scale(
        &self,
        table: &Table,
        schema: &FeatureSchema,
        mode: ScaleMode<'_>,
    ) -> Result<(Array2<f64>, ScalerState)> {
        let columns = align_columns(table, schema)?;
        let n_rows = table.n_rows();
        let n_cols = schema.len();

        let medians = match mode {
            ScaleMode::Fit => {
                if n_rows == 0 {
                    return Err(PredictorError::InsufficientData { needed: 1, got: 0 });
                }
                columns.iter().map(|c| median_of_present(c)).collect::<Vec<_>>()
            }
            ScaleMode::Transform(state) => {
                if !state.is_consistent() || state.width() != n_cols {
                    return Err(PredictorError::SchemaMismatch(format!(
                        "scaler has {} features, schema has {}",
                        state.width(),
                        n_cols
                    )));
                }
                match self.policy {
                    ImputePolicy::TrainingMedian if !state.medians.is_empty() => {
                        state.medians.clone()
                    }
                    _ => columns.iter().map(|c| median_of_present(c)).collect(),
                }
            }
        };

        let mut matrix = Array2::<f64>::zeros((n_rows, n_cols));
        for (j, column) in columns.iter().enumerate() {
            for (i, cell) in column.iter().enumerate() {
                matrix[[i, j]] = cell.unwrap_or(medians[j]);
            }
        }

        let state = match mode {
            ScaleMode::Fit => {
                let (mean, scale) = column_moments(&matrix);
                ScalerState {
                    mean,
                    scale,
                    medians,
                    policy: self.policy,
                }
            }
            ScaleMode::Transform(state) => state.clone(),
        };

        for mut row in matrix.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - state.mean[j]) / state.scale[j];
            }
        }

        Ok((matrix, state))
    }
}

/// Pull schema columns out of the table in schema order
fn align_columns(table: &Table, schema: &FeatureSchema) -> Result<Vec<Vec<Option<f64>>>> {
    schema
        .iter()
        .map(|name| {
            table.column(name).ok_or_else(|| {
                PredictorError::SchemaMismatch(format!("column '{}' is missing from input", name))
            })
        })
        .collect()
}

/// Median of the present values; 0.0 for a column with none
pub(crate) fn median_of_present(values: &[Option<f64>]) -> f64 {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return 0.0;
    }
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = present.len();
    if n % 2 == 0 {
        (present[n / 2 - 1] + present[n / 2]) / 2.0
    } else {
        present[n / 2]
    }
}

/// Per-column mean and population standard deviation
fn column_moments(matrix: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let n = matrix.nrows() as f64;
    matrix
        .columns()
        .into_iter()
        .map(|col| {
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > 0.0 { std } else { 1.0 })
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Option<f64>>>) -> Table {
        Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_fit_produces_zero_mean_unit_variance() {
        let t = table(
            &["a", "b"],
            vec![
                vec![Some(1.0), Some(10.0)],
                vec![Some(2.0), Some(20.0)],
                vec![Some(3.0), Some(30.0)],
            ],
        );
        let schema = FeatureSchema::from(vec!["a", "b"]);
        let (x, state) = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Fit)
            .unwrap();

        assert_eq!(state.mean, vec![2.0, 20.0]);
        for col in x.columns() {
            assert!(col.sum().abs() < 1e-12);
            let var = col.iter().map(|v| v * v).sum::<f64>() / 3.0;
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_columns_are_reordered_to_schema() {
        let t = table(&["b", "a"], vec![vec![Some(5.0), Some(1.0)]]);
        let schema = FeatureSchema::from(vec!["a", "b"]);
        let state = ScalerState::new(vec![0.0, 0.0], vec![1.0, 1.0]);
        let (x, _) = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Transform(&state))
            .unwrap();
        assert_eq!(x.row(0).to_vec(), vec![1.0, 5.0]);
    }

    #[test]
    fn test_missing_schema_column_is_mismatch() {
        let t = table(&["a"], vec![vec![Some(1.0)]]);
        let schema = FeatureSchema::from(vec!["a", "b"]);
        let err = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Fit)
            .unwrap_err();
        assert!(matches!(err, PredictorError::SchemaMismatch(_)));
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let t = table(&["a"], vec![vec![Some(4.0)], vec![Some(4.0)]]);
        let schema = FeatureSchema::from(vec!["a"]);
        let (x, state) = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Fit)
            .unwrap();
        assert_eq!(state.scale, vec![1.0]);
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_fit_imputes_with_batch_median() {
        let t = table(
            &["a"],
            vec![vec![Some(1.0)], vec![None], vec![Some(3.0)], vec![Some(10.0)]],
        );
        let schema = FeatureSchema::from(vec!["a"]);
        let (_, state) = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Fit)
            .unwrap();
        assert_eq!(state.medians, vec![3.0]);
        // imputed column is [1, 3, 3, 10]
        assert!((state.mean[0] - 4.25).abs() < 1e-12);
    }

    #[test]
    fn test_transform_reuses_training_median() {
        let schema = FeatureSchema::from(vec!["a"]);
        let mut state = ScalerState::new(vec![0.0], vec![1.0]);
        state.medians = vec![7.0];

        let t = table(&["a"], vec![vec![None], vec![Some(100.0)]]);
        let (x, _) = Preprocessor::with_policy(ImputePolicy::TrainingMedian)
            .align_and_scale(&t, &schema, ScaleMode::Transform(&state))
            .unwrap();
        assert_eq!(x[[0, 0]], 7.0);
    }

    #[test]
    fn test_transform_batch_median_policy() {
        let schema = FeatureSchema::from(vec!["a"]);
        let mut state = ScalerState::new(vec![0.0], vec![1.0]);
        state.medians = vec![7.0];

        let t = table(&["a"], vec![vec![None], vec![Some(100.0)]]);
        let (x, _) = Preprocessor::with_policy(ImputePolicy::BatchMedian)
            .align_and_scale(&t, &schema, ScaleMode::Transform(&state))
            .unwrap();
        assert_eq!(x[[0, 0]], 100.0);
    }

    #[test]
    fn test_transform_width_mismatch() {
        let t = table(&["a", "b"], vec![vec![Some(1.0), Some(2.0)]]);
        let schema = FeatureSchema::from(vec!["a", "b"]);
        let state = ScalerState::new(vec![0.0], vec![1.0]);
        let err = Preprocessor::new()
            .align_and_scale(&t, &schema, ScaleMode::Transform(&state))
            .unwrap_err();
        assert!(matches!(err, PredictorError::SchemaMismatch(_)));
    }

    #[test]
    fn test_median_of_present() {
        assert_eq!(median_of_present(&[]), 0.0);
        assert_eq!(median_of_present(&[None, None]), 0.0);
        assert_eq!(median_of_present(&[Some(1.0), Some(2.0)]), 1.5);
        assert_eq!(median_of_present(&[Some(5.0), None, Some(1.0), Some(3.0)]), 3.0);
    }
}
