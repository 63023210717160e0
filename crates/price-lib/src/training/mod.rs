//! Training orchestration
//!
//! Turns a labelled table into a ready-to-persist [`ArtifactBundle`]:
//! label separation, seeded 80/20 split, scaler fit on the training partition
//! only, regressor fit and held-out evaluation.

mod metrics;
mod split;

pub use metrics::{mae, mse, r2, rmse};
pub use split::train_test_split;

use crate::bundle::ArtifactBundle;
use crate::dataset::Table;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureSchema, Metadata, ModelKind, TrainingMetrics};
use crate::predictor::{
    ForestConfig, ImputePolicy, Model, Preprocessor, Regressor, ScaleMode, DEFAULT_N_ESTIMATORS,
    DEFAULT_SEED,
};
use ndarray::Array1;
use std::time::Instant;
use tracing::{debug, info};

/// Name of the label column in every training table
pub const LABEL_COLUMN: &str = "target";

/// Fraction of rows held out for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Minimum labelled rows needed to produce both partitions
pub const MIN_TRAINING_ROWS: usize = 2;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub model_kind: ModelKind,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub impute_policy: ImputePolicy,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::RandomForest,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_depth: None,
            min_samples_split: 2,
            seed: DEFAULT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            impute_policy: ImputePolicy::default(),
        }
    }
}

impl TrainOptions {
    pub fn with_model_kind(mut self, kind: ModelKind) -> Self {
        self.model_kind = kind;
        self
    }

    fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            seed: self.seed,
            ..ForestConfig::default()
        }
    }
}

fn first_non_finite(table: &Table) -> Option<(usize, usize)> {
    table.rows().iter().enumerate().find_map(|(r, row)| {
        row.iter()
            .position(|cell| cell.map_or(false, |v| !v.is_finite()))
            .map(|c| (r, c))
    })
}

/// A freshly trained bundle and its evaluation
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub bundle: ArtifactBundle,
    pub metrics: TrainingMetrics,
}

/// Train a model on a table containing the [`LABEL_COLUMN`]
pub fn train(table: &Table, options: &TrainOptions) -> Result<TrainOutcome> {
    let start = Instant::now();
    let label_idx = table.column_index(LABEL_COLUMN).ok_or_else(|| {
        PredictorError::SchemaViolation(format!("data must contain '{}' column", LABEL_COLUMN))
    })?;

    // A row without a label cannot be imputed
    let labelled: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row[label_idx].map_or(false, f64::is_finite))
        .map(|(i, _)| i)
        .collect();
    if labelled.len() < MIN_TRAINING_ROWS {
        return Err(PredictorError::InsufficientData {
            needed: MIN_TRAINING_ROWS,
            got: labelled.len(),
        });
    }
    let dropped = table.n_rows() - labelled.len();
    if dropped > 0 {
        debug!(dropped, "Dropped rows without a label");
    }

    let table = table.select_rows(&labelled);
    let features = table.without_column(LABEL_COLUMN);
    let schema = FeatureSchema::new(features.columns().to_vec());
    if schema.is_empty() {
        return Err(PredictorError::SchemaViolation(
            "data has no feature columns besides the label".to_string(),
        ));
    }
    if let Some((row, idx)) = first_non_finite(&features) {
        return Err(PredictorError::InvalidData(format!(
            "row {} column '{}' is not a finite number",
            row + 1,
            features.columns()[idx]
        )));
    }
    let labels: Vec<f64> = table
        .rows()
        .iter()
        .map(|row| row[label_idx].unwrap_or_default())
        .collect();

    let (train_idx, test_idx) =
        train_test_split(table.n_rows(), options.test_fraction, options.seed);
    let train_features = features.select_rows(&train_idx);
    let test_features = features.select_rows(&test_idx);
    let y_train: Array1<f64> = train_idx.iter().map(|&i| labels[i]).collect();
    let y_test: Array1<f64> = test_idx.iter().map(|&i| labels[i]).collect();

    let preprocessor = Preprocessor::with_policy(options.impute_policy);
    let (x_train, scaler) = preprocessor.align_and_scale(&train_features, &schema, ScaleMode::Fit)?;
    let (x_test, _) =
        preprocessor.align_and_scale(&test_features, &schema, ScaleMode::Transform(&scaler))?;

    let mut model = Model::untrained(options.model_kind, options.forest_config());
    model.fit(x_train.view(), y_train.view())?;

    let y_pred = model.predict(x_test.view())?;
    let metrics = TrainingMetrics {
        rmse: rmse(y_test.view(), y_pred.view()),
        mae: mae(y_test.view(), y_pred.view()),
        r2: r2(y_test.view(), y_pred.view()),
        training_samples: train_idx.len(),
    };

    let metadata = Metadata {
        model_type: options.model_kind,
        features: schema.names().to_vec(),
        metrics,
        training_samples: metrics.training_samples,
        user_data_file: None,
        trained_at: Some(chrono::Utc::now()),
        version: None,
    };

    info!(
        model_type = %options.model_kind,
        training_samples = metrics.training_samples,
        test_samples = test_idx.len(),
        rmse = metrics.rmse,
        mae = metrics.mae,
        r2 = metrics.r2,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model training completed"
    );

    let bundle = ArtifactBundle::new(model, scaler, schema, metadata)?;
    Ok(TrainOutcome { bundle, metrics })
}

/// Append user rows to a base dataset and train on the union.
///
/// `source` is recorded as provenance in the bundle metadata.
pub fn retrain_with_extra_data(
    user_table: &Table,
    base_table: &Table,
    options: &TrainOptions,
    source: Option<&str>,
) -> Result<TrainOutcome> {
    if !user_table.has_column(LABEL_COLUMN) {
        return Err(PredictorError::SchemaViolation(format!(
            "CSV must contain '{}' column",
            LABEL_COLUMN
        )));
    }

    let combined = base_table.concat(user_table);
    debug!(
        base_rows = base_table.n_rows(),
        user_rows = user_table.n_rows(),
        "Combined retraining data"
    );

    let mut outcome = train(&combined, options)?;
    if let Some(source) = source {
        outcome = TrainOutcome {
            bundle: with_provenance(outcome.bundle, source)?,
            metrics: outcome.metrics,
        };
    }
    Ok(outcome)
}

fn with_provenance(bundle: ArtifactBundle, source: &str) -> Result<ArtifactBundle> {
    let mut metadata = bundle.metadata().clone();
    metadata.user_data_file = Some(source.to_string());
    ArtifactBundle::new(
        bundle.model().clone(),
        bundle.scaler().clone(),
        bundle.schema().clone(),
        metadata,
    )
}
