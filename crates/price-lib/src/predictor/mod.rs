//! Regression models, feature preprocessing and price inference

mod features;
mod forest;
mod inference;
mod linear;
mod trend;

pub use features::{ImputePolicy, Preprocessor, ScaleMode, ScalerState};
pub use forest::{ForestConfig, RandomForest, RegressionTree, DEFAULT_N_ESTIMATORS, DEFAULT_SEED};
pub use inference::{
    align_features, predict_bulk_with, predict_with, BulkPrediction, PricePrediction, PRICE_SCALE,
};
pub use linear::LinearRegression;
pub use trend::{PriceTrendModel, TrendPrediction, BASE_PRICE, YEARLY_INCREASE};

use crate::error::{PredictorError, Result};
use crate::models::ModelKind;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Fit/predict contract for any pluggable regression algorithm
pub trait Regressor: Send + Sync {
    /// Fit model parameters to a feature matrix and target vector
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predict one value per matrix row
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Number of input features the fitted model expects
    fn n_features(&self) -> usize;
}

/// Fitted regressor as persisted in an artifact bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Linear(LinearRegression),
    RandomForest(RandomForest),
}

impl Model {
    /// Unfitted model of the given kind
    pub fn untrained(kind: ModelKind, forest: ForestConfig) -> Self {
        match kind {
            ModelKind::Linear => Model::Linear(LinearRegression::new()),
            ModelKind::RandomForest => Model::RandomForest(RandomForest::new(forest)),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Linear(_) => ModelKind::Linear,
            Model::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::RandomForest(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::RandomForest(m) => m,
        }
    }
}

impl Regressor for Model {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }
}

pub(crate) fn check_width(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(PredictorError::SchemaMismatch(format!(
            "model expects {} features, got {}",
            expected, got
        )));
    }
    Ok(())
}
