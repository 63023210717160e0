//! Price inference against a loaded artifact bundle
//!
//! Single-point predictions fill any schema feature the caller left out with
//! 0.0, reorder to the stored schema, scale with the stored state and convert
//! the raw model output to currency units.

use super::{Preprocessor, Regressor, ScaleMode};
use crate::bundle::ArtifactBundle;
use crate::dataset::Table;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureMap, FeatureSchema};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Model targets are in units of 100,000 dollars
pub const PRICE_SCALE: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub predicted_price: f64,
    pub features_used: FeatureMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPrediction {
    pub predictions: Vec<f64>,
    pub count: usize,
}

/// Values in schema order, 0.0 for every feature absent from `features`
pub fn align_features(features: &FeatureMap, schema: &FeatureSchema) -> Vec<f64> {
    schema
        .iter()
        .map(|name| features.get(name).copied().unwrap_or(0.0))
        .collect()
}

/// Predict one price
pub fn predict_with(bundle: &ArtifactBundle, features: &FeatureMap) -> Result<PricePrediction> {
    let prices = predict_rows(bundle, std::slice::from_ref(features))?;
    let predicted_price = prices
        .first()
        .copied()
        .ok_or_else(|| PredictorError::Internal("model returned no prediction".to_string()))?;
    Ok(PricePrediction {
        predicted_price,
        features_used: features.clone(),
    })
}

/// Predict one price per row. Any failing row fails the whole batch.
pub fn predict_bulk_with(bundle: &ArtifactBundle, rows: &[FeatureMap]) -> Result<BulkPrediction> {
    let predictions = predict_rows(bundle, rows)?;
    Ok(BulkPrediction {
        count: predictions.len(),
        predictions,
    })
}

fn predict_rows(bundle: &ArtifactBundle, rows: &[FeatureMap]) -> Result<Vec<f64>> {
    let schema = bundle.schema();
    for (i, row) in rows.iter().enumerate() {
        if let Some((name, _)) = row.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PredictorError::InvalidData(format!(
                "row {}: feature '{}' is not a finite number",
                i, name
            )));
        }
    }

    let dense: Vec<Vec<Option<f64>>> = rows
        .iter()
        .map(|row| align_features(row, schema).into_iter().map(Some).collect())
        .collect();
    let table = Table::from_rows(schema.names().to_vec(), dense)?;

    let preprocessor = Preprocessor::with_policy(bundle.scaler().policy);
    let (x, _) = preprocessor.align_and_scale(&table, schema, ScaleMode::Transform(bundle.scaler()))?;
    let raw = bundle.model().predict(x.view())?;

    debug!(rows = rows.len(), "Computed price predictions");
    Ok(raw.iter().map(|v| v * PRICE_SCALE).collect())
}
