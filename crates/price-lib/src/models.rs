//! Core data models for the price predictor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single property's features keyed by name
pub type FeatureMap = BTreeMap<String, f64>;

/// Ordered feature names fixed at training time.
///
/// Defines the column order of every matrix handed to the model. A schema is
/// never edited in place; retraining produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<&str>> for FeatureSchema {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

/// Regression algorithm family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    Linear,
}

impl ModelKind {
    /// Label reported in metadata and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForestRegressor",
            ModelKind::Linear => "LinearRegression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "random_forest"),
            ModelKind::Linear => write!(f, "linear"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random_forest" | "randomforest" | "rf" => Ok(ModelKind::RandomForest),
            "linear" | "linear_regression" => Ok(ModelKind::Linear),
            other => Err(format!("unknown model type: {}", other)),
        }
    }
}

/// Held-out evaluation metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub training_samples: usize,
}

/// Descriptive information about a trained bundle. Never used for computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub model_type: ModelKind,
    pub features: Vec<String>,
    pub metrics: TrainingMetrics,
    pub training_samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Artifact version assigned by the store on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Model information returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    pub feature_names: Vec<String>,
    pub metadata: Metadata,
}
