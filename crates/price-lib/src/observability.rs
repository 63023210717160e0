//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, training duration, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge, Encoder, GaugeVec, Histogram, HistogramVec,
    IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for single and bulk prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Training can take minutes on the full dataset
const TRAINING_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

static GLOBAL_METRICS: OnceLock<Option<ServiceMetricsInner>> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: HistogramVec,
    training_duration_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors: IntCounterVec,
    training_runs: IntCounterVec,
    model_info: GaugeVec,
    model_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            prediction_latency_seconds: register_histogram_vec!(
                "house_price_prediction_latency_seconds",
                "Time spent running inference, by endpoint",
                &["endpoint"],
                LATENCY_BUCKETS.to_vec()
            )?,
            training_duration_seconds: register_histogram!(
                "house_price_training_duration_seconds",
                "Wall time of a train or retrain run including persistence",
                TRAINING_BUCKETS.to_vec()
            )?,
            predictions_total: register_int_counter!(
                "house_price_predictions_total",
                "Total number of prices predicted"
            )?,
            prediction_errors: register_int_counter_vec!(
                "house_price_prediction_errors_total",
                "Failed prediction requests by error kind",
                &["kind"]
            )?,
            training_runs: register_int_counter_vec!(
                "house_price_training_runs_total",
                "Training runs by outcome",
                &["outcome"]
            )?,
            model_info: register_gauge_vec!(
                "house_price_model_info",
                "Information about the currently loaded model",
                &["version", "model_type"]
            )?,
            model_loaded: register_int_gauge!(
                "house_price_model_loaded",
                "1 when an artifact bundle is being served"
            )?,
        })
    }
}

/// Service metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics. If registration fails the handle is inert.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match ServiceMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register Prometheus metrics");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&ServiceMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_prediction(&self, endpoint: &str, duration_secs: f64, count: usize) {
        if let Some(m) = self.inner() {
            m.prediction_latency_seconds
                .with_label_values(&[endpoint])
                .observe(duration_secs);
            m.predictions_total.inc_by(count as u64);
        }
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        if let Some(m) = self.inner() {
            m.prediction_errors.with_label_values(&[kind]).inc();
        }
    }

    pub fn observe_training(&self, duration_secs: f64, success: bool) {
        if let Some(m) = self.inner() {
            m.training_duration_seconds.observe(duration_secs);
            let outcome = if success { "success" } else { "failure" };
            m.training_runs.with_label_values(&[outcome]).inc();
        }
    }

    /// Replace the model info series with the newly served model
    pub fn set_model(&self, version: &str, model_type: &str) {
        if let Some(m) = self.inner() {
            m.model_info.reset();
            m.model_info
                .with_label_values(&[version, model_type])
                .set(1.0);
            m.model_loaded.set(1);
        }
    }

    pub fn set_model_unloaded(&self) {
        if let Some(m) = self.inner() {
            m.model_info.reset();
            m.model_loaded.set(0);
        }
    }
}

/// Render the default registry in the Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_version: Option<&str>) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            model_version = model_version.unwrap_or("none"),
            "House price service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "House price service shutting down"
        );
    }

    pub fn log_training_completed(
        &self,
        version: &str,
        model_type: &str,
        training_samples: usize,
        rmse: f64,
        r2: f64,
        duration_secs: f64,
    ) {
        info!(
            event = "training_completed",
            service = %self.service_name,
            version = %version,
            model_type = %model_type,
            training_samples = training_samples,
            rmse = rmse,
            r2 = r2,
            duration_secs = duration_secs,
            "Model trained and persisted"
        );
    }

    pub fn log_training_failed(&self, error_kind: &str, error: &str) {
        warn!(
            event = "training_failed",
            service = %self.service_name,
            error_kind = %error_kind,
            error = %error,
            "Training failed, keeping previous model"
        );
    }

    pub fn log_bundle_swapped(&self, old_version: Option<&str>, new_version: &str) {
        info!(
            event = "bundle_swapped",
            service = %self.service_name,
            old_version = old_version.unwrap_or("none"),
            new_version = %new_version,
            "Serving new artifact bundle"
        );
    }

    pub fn log_bulk_prediction(&self, rows: usize, model_version: Option<&str>) {
        info!(
            event = "bulk_prediction",
            service = %self.service_name,
            rows = rows,
            model_version = model_version.unwrap_or("unversioned"),
            "Bulk prediction served"
        );
    }
}
