//! HTTP API for prediction, training, health checks and Prometheus metrics

use crate::config::ServerConfig;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use price_lib::{
    gather_metrics,
    health::{components, ComponentStatus, HealthRegistry},
    FeatureMap, ModelKind, ModelService, PredictorError, PriceTrendModel, Table, TrainReport,
    TrainingMetrics, TrendPrediction,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    pub service: Arc<ModelService>,
    pub health_registry: HealthRegistry,
    pub trend: PriceTrendModel,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        service: Arc<ModelService>,
        health_registry: HealthRegistry,
        trend: PriceTrendModel,
        config: ServerConfig,
    ) -> Self {
        Self {
            service,
            health_registry,
            trend,
            config,
        }
    }
}

/// Error body is always `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    Predictor(PredictorError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<PredictorError> for ApiError {
    fn from(e: PredictorError) -> Self {
        ApiError::Predictor(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Predictor(e) => {
                let status = match &e {
                    PredictorError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
                    PredictorError::SchemaMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    PredictorError::SchemaViolation(_)
                    | PredictorError::InvalidData(_)
                    | PredictorError::InsufficientData { .. } => StatusCode::BAD_REQUEST,
                    PredictorError::CorruptArtifact(_)
                    | PredictorError::Io { .. }
                    | PredictorError::Serialization(_)
                    | PredictorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    warn!(error = %e, kind = e.kind(), "Request failed");
                }
                (status, e.to_string())
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Internal(detail) => {
                warn!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: FeatureMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkPredictRequest {
    pub data: Vec<FeatureMap>,
}

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    pub model_type: Option<String>,
}

impl TrainQuery {
    fn model_kind(&self) -> Result<Option<ModelKind>, ApiError> {
        self.model_type
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(ApiError::BadRequest)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub message: String,
    pub version: String,
    pub model_type: ModelKind,
    pub metrics: TrainingMetrics,
    pub feature_names: Vec<String>,
}

impl TrainResponse {
    fn from_report(message: impl Into<String>, report: TrainReport) -> Self {
        Self {
            message: message.into(),
            version: report.version,
            model_type: report.model_type,
            metrics: report.metrics,
            feature_names: report.feature_names,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendRequest {
    pub years_from_now: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let bundle = state.service.current();
    Json(HealthStatus {
        status: "ok".to_string(),
        model_loaded: bundle.is_some(),
        features: bundle
            .map(|b| b.schema().names().to_vec())
            .unwrap_or_default(),
    })
}

/// Component health, 503 only when something is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = gather_metrics().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<price_lib::PricePrediction> {
    let Json(request) = payload?;
    Ok(Json(state.service.predict(&request.features)?))
}

async fn predict_bulk(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BulkPredictRequest>, JsonRejection>,
) -> ApiResult<price_lib::BulkPrediction> {
    let Json(request) = payload?;
    Ok(Json(state.service.predict_bulk(&request.data)?))
}

async fn model_info(State(state): State<Arc<AppState>>) -> ApiResult<price_lib::ModelInfo> {
    Ok(Json(state.service.info()?))
}

async fn train(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrainQuery>,
) -> ApiResult<TrainResponse> {
    let options = state.config.train_options(query.model_kind()?);
    let path = state.config.base_data_path.clone();
    if !path.exists() {
        return Err(ApiError::NotFound(format!(
            "Dataset not found at {}",
            path.display()
        )));
    }

    let table = read_table(path).await?;
    info!(rows = table.n_rows(), model_type = %options.model_kind, "Training on base dataset");
    let report = state.service.train(table, options).await?;
    mark_bundle_served(&state.health_registry, &report.version).await;

    Ok(Json(TrainResponse::from_report(
        "Model trained successfully",
        report,
    )))
}

/// Multipart upload with a CSV `file` field, appended to the base dataset
async fn retrain(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrainQuery>,
    mut multipart: Multipart,
) -> ApiResult<TrainResponse> {
    let options = state.config.train_options(query.model_kind()?);

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }
    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    if !file_name.to_ascii_lowercase().ends_with(".csv") {
        return Err(ApiError::BadRequest("File must be a CSV".to_string()));
    }

    let user_table = Table::from_csv_reader(bytes.as_slice())?;
    if !user_table.has_column(price_lib::LABEL_COLUMN) {
        return Err(PredictorError::SchemaViolation(format!(
            "CSV must contain '{}' column",
            price_lib::LABEL_COLUMN
        ))
        .into());
    }

    let saved = save_upload(&state.config.uploads_dir, &file_name, bytes).await?;

    let base_path = state.config.base_data_path.clone();
    let base_table = if base_path.exists() {
        read_table(base_path).await?
    } else {
        warn!(path = %base_path.display(), "Base dataset missing, retraining on upload only");
        Table::default()
    };

    info!(
        upload = %saved.display(),
        user_rows = user_table.n_rows(),
        base_rows = base_table.n_rows(),
        "Retraining with uploaded data"
    );
    let source = saved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let report = state
        .service
        .retrain(user_table, base_table, options, source)
        .await?;
    mark_bundle_served(&state.health_registry, &report.version).await;

    Ok(Json(TrainResponse::from_report(
        "Model retrained successfully with new data",
        report,
    )))
}

async fn trend_predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TrendRequest>, JsonRejection>,
) -> ApiResult<TrendPrediction> {
    let Json(request) = payload?;
    Ok(Json(state.trend.predict(request.years_from_now)))
}

async fn read_table(path: PathBuf) -> Result<Table, ApiError> {
    tokio::task::spawn_blocking(move || Table::from_csv_path(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("dataset reader failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn save_upload(dir: &Path, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create {}: {}", dir.display(), e)))?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let path = dir.join(format!("{}_{}", stamp, sanitize_file_name(file_name)));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save {}: {}", path.display(), e)))?;
    Ok(path)
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/predict/bulk", post(predict_bulk))
        .route("/train", post(train))
        .route("/retrain", post(retrain))
        .route("/model/info", get(model_info))
        .route("/trend/predict", post(trend_predict))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// A freshly saved and swapped bundle clears any earlier store failure
pub async fn mark_bundle_served(registry: &HealthRegistry, version: &str) {
    registry.set_model_loaded(true, Some(version)).await;
    registry.set_healthy(components::ARTIFACT_STORE).await;
}

/// Seed component health from the service state at startup
pub async fn init_health(registry: &HealthRegistry, service: &ModelService) {
    registry.register(components::ARTIFACT_STORE).await;
    let version = service.current().and_then(|b| b.version().map(str::to_string));
    registry
        .set_model_loaded(service.is_loaded(), version.as_deref())
        .await;
}
