//! Prediction service: the single owner of the served artifact bundle
//!
//! Readers clone an `Arc` out of the lock and predict without holding it.
//! Training, persistence and the swap run under one async mutex, so two
//! training requests never interleave their writes to the store.

use crate::bundle::ArtifactBundle;
use crate::dataset::Table;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureMap, ModelInfo, ModelKind, TrainingMetrics};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::predictor::{predict_bulk_with, predict_with, BulkPrediction, PricePrediction};
use crate::store::ArtifactStore;
use crate::training::{self, TrainOptions, TrainOutcome};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

/// Result of a successful train or retrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub version: String,
    pub model_type: ModelKind,
    pub metrics: TrainingMetrics,
    pub feature_names: Vec<String>,
}

pub struct ModelService {
    store: ArtifactStore,
    current: Arc<RwLock<Option<Arc<ArtifactBundle>>>>,
    training_lock: Arc<Mutex<()>>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl ModelService {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            current: Arc::new(RwLock::new(None)),
            training_lock: Arc::new(Mutex::new(())),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("price-service"),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Load the store's current bundle, if one exists, and serve it
    pub fn load_from_disk(&self) -> Result<Option<String>> {
        match self.store.load()? {
            Some(bundle) => {
                let version = bundle.version().unwrap_or_default().to_string();
                swap_bundle(&self.current, &self.metrics, &self.logger, bundle);
                Ok(Some(version))
            }
            None => {
                self.metrics.set_model_unloaded();
                Ok(None)
            }
        }
    }

    /// Snapshot of the served bundle
    pub fn current(&self) -> Option<Arc<ArtifactBundle>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    fn require_bundle(&self) -> Result<Arc<ArtifactBundle>> {
        self.current().ok_or(PredictorError::ModelNotLoaded)
    }

    pub fn predict(&self, features: &FeatureMap) -> Result<PricePrediction> {
        let start = Instant::now();
        let result = self
            .require_bundle()
            .and_then(|bundle| predict_with(&bundle, features));
        match &result {
            Ok(_) => self
                .metrics
                .observe_prediction("predict", start.elapsed().as_secs_f64(), 1),
            Err(e) => self.metrics.inc_prediction_errors(e.kind()),
        }
        result
    }

    pub fn predict_bulk(&self, rows: &[FeatureMap]) -> Result<BulkPrediction> {
        let start = Instant::now();
        let result = self.require_bundle().and_then(|bundle| {
            let predictions = predict_bulk_with(&bundle, rows)?;
            self.logger.log_bulk_prediction(predictions.count, bundle.version());
            Ok(predictions)
        });
        match &result {
            Ok(p) => self.metrics.observe_prediction(
                "predict_bulk",
                start.elapsed().as_secs_f64(),
                p.count,
            ),
            Err(e) => self.metrics.inc_prediction_errors(e.kind()),
        }
        result
    }

    pub fn info(&self) -> Result<ModelInfo> {
        let bundle = self.require_bundle()?;
        Ok(ModelInfo {
            model_loaded: true,
            feature_names: bundle.schema().names().to_vec(),
            metadata: bundle.metadata().clone(),
        })
    }

    /// Train on `table`, persist and serve the result
    pub async fn train(&self, table: Table, options: TrainOptions) -> Result<TrainReport> {
        self.run_training(move || training::train(&table, &options))
            .await
    }

    /// Train on `base_table` plus `user_table`, persist and serve the result
    pub async fn retrain(
        &self,
        user_table: Table,
        base_table: Table,
        options: TrainOptions,
        source: Option<String>,
    ) -> Result<TrainReport> {
        self.run_training(move || {
            training::retrain_with_extra_data(&user_table, &base_table, &options, source.as_deref())
        })
        .await
    }

    /// Compute, persist and swap as one task that owns the training lock.
    ///
    /// Dropping the returned future does not cancel the task, so the lock
    /// stays held until the bundle is on disk and served.
    async fn run_training<F>(&self, job: F) -> Result<TrainReport>
    where
        F: FnOnce() -> Result<TrainOutcome> + Send + 'static,
    {
        let guard = self.training_lock.clone().lock_owned().await;
        let store = self.store.clone();
        let current = self.current.clone();
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let start = Instant::now();

            let result = tokio::task::spawn_blocking(move || {
                let outcome = job()?;
                let version = store.save(&outcome.bundle)?;
                Ok::<_, PredictorError>((outcome.bundle.with_version(version), outcome.metrics))
            })
            .await
            .map_err(|e| PredictorError::Internal(format!("training task failed: {}", e)))
            .and_then(|r| r);

            let elapsed = start.elapsed().as_secs_f64();
            metrics.observe_training(elapsed, result.is_ok());

            let (bundle, training_metrics) = match result {
                Ok(done) => done,
                Err(e) => {
                    logger.log_training_failed(e.kind(), &e.to_string());
                    return Err(e);
                }
            };

            let report = TrainReport {
                version: bundle.version().unwrap_or_default().to_string(),
                model_type: bundle.model().kind(),
                metrics: training_metrics,
                feature_names: bundle.schema().names().to_vec(),
            };
            logger.log_training_completed(
                &report.version,
                &report.model_type.to_string(),
                training_metrics.training_samples,
                training_metrics.rmse,
                training_metrics.r2,
                elapsed,
            );
            swap_bundle(&current, &metrics, &logger, bundle);
            Ok(report)
        });

        task.await
            .map_err(|e| PredictorError::Internal(format!("training task failed: {}", e)))?
    }
}

/// Replace the served bundle in one pointer swap
fn swap_bundle(
    current: &RwLock<Option<Arc<ArtifactBundle>>>,
    metrics: &ServiceMetrics,
    logger: &StructuredLogger,
    bundle: ArtifactBundle,
) {
    let new_version = bundle.version().unwrap_or_default().to_string();
    let model_type = bundle.model().kind().to_string();
    let old = current
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .replace(Arc::new(bundle));
    let old_version = old.as_ref().and_then(|b| b.version().map(str::to_string));
    debug!(old = ?old_version, new = %new_version, "Swapping artifact bundle");

    metrics.set_model(&new_version, &model_type);
    logger.log_bundle_swapped(old_version.as_deref(), &new_version);
}
