//! Core library for house price prediction
//!
//! This crate provides the core functionality for:
//! - Tabular CSV datasets and feature alignment
//! - Random forest and linear regression models
//! - Training with a seeded split and held-out metrics
//! - A versioned, checksummed artifact store
//! - The prediction service that serves one bundle at a time
//! - Health checks and observability

pub mod bundle;
pub mod dataset;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;
pub mod store;
pub mod training;

pub use bundle::ArtifactBundle;
pub use dataset::Table;
pub use error::{PredictorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{gather_metrics, ServiceMetrics, StructuredLogger};
pub use predictor::{BulkPrediction, PricePrediction, PriceTrendModel, TrendPrediction};
pub use service::{ModelService, TrainReport};
pub use store::{ArtifactStore, StoreConfig};
pub use training::{retrain_with_extra_data, train, TrainOptions, TrainOutcome, LABEL_COLUMN};
