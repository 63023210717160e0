//! Integration tests for the prediction server API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use price_lib::{health::components, ArtifactStore, HealthRegistry, ModelService, PriceTrendModel};
use price_server::{
    api::{create_router, init_health, AppState},
    config::ServerConfig,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----price-test-boundary";

fn housing_csv(rows: usize) -> String {
    let mut csv = String::from("MedInc,HouseAge,target\n");
    for i in 0..rows {
        let med_inc = 1.0 + (i % 13) as f64 * 0.6;
        let age = 5.0 + (i * 3 % 35) as f64;
        csv.push_str(&format!("{},{},{}\n", med_inc, age, 0.4 * med_inc + 0.02 * age));
    }
    csv
}

fn test_config(dir: &Path, with_base: bool) -> ServerConfig {
    let base_data_path = dir.join("data").join("housing.csv");
    if with_base {
        std::fs::create_dir_all(base_data_path.parent().unwrap()).unwrap();
        std::fs::write(&base_data_path, housing_csv(60)).unwrap();
    }
    ServerConfig {
        models_dir: dir.join("models"),
        base_data_path,
        uploads_dir: dir.join("uploads"),
        n_estimators: 8,
        ..ServerConfig::default()
    }
}

async fn setup_test_app(dir: &Path, with_base: bool) -> (Router, Arc<AppState>) {
    let config = test_config(dir, with_base);
    let store = ArtifactStore::new(config.store_config()).unwrap();
    let service = Arc::new(ModelService::new(store));
    service.load_from_disk().unwrap();

    let health_registry = HealthRegistry::new();
    init_health(&health_registry, &service).await;
    health_registry.set_ready(true).await;

    let state = Arc::new(AppState::new(
        service,
        health_registry,
        PriceTrendModel::train().unwrap(),
        config,
    ));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_csv_upload(uri: &str, file_name: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = file_name,
        c = contents
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_without_model() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["features"], json!([]));
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(
        &app,
        post_json("/predict", json!({"features": {"MedInc": 3.0}})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("not loaded"));

    let (status, _) = send(&app, get("/model/info")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_train_then_predict() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, post_empty("/train")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["version"], "v0001");
    assert_eq!(body["feature_names"], json!(["MedInc", "HouseAge"]));
    assert_eq!(body["metrics"]["training_samples"], 48);

    let (status, body) = send(
        &app,
        post_json(
            "/predict",
            json!({"features": {"MedInc": 4.0, "HouseAge": 20.0, "Unknown": 1.0}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["predicted_price"].as_f64().unwrap() > 0.0);
    assert_eq!(body["features_used"]["Unknown"], 1.0);

    let (status, body) = send(&app, get("/model/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["metadata"]["model_type"], "random_forest");

    let (_, body) = send(&app, get("/health")).await;
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["features"], json!(["MedInc", "HouseAge"]));
}

#[tokio::test]
async fn test_train_with_linear_model_type() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, post_empty("/train?model_type=linear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_type"], "linear");
    assert!(body["metrics"]["r2"].as_f64().unwrap() > 0.99);

    let (status, body) = send(&app, post_empty("/train?model_type=xgboost")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("xgboost"));
}

#[tokio::test]
async fn test_train_without_dataset_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), false).await;

    let (status, body) = send(&app, post_empty("/train")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("Dataset not found"));
}

#[tokio::test]
async fn test_bulk_predict() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;
    send(&app, post_empty("/train")).await;

    let (status, body) = send(
        &app,
        post_json(
            "/predict/bulk",
            json!({"data": [{"MedInc": 2.0}, {"MedInc": 5.0, "HouseAge": 10.0}, {}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["predictions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(
        &app,
        post_json("/predict", json!({"features": {"MedInc": "high"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_retrain_requires_target_column() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(
        &app,
        post_csv_upload("/retrain", "extra.csv", "MedInc,HouseAge\n1.0,2.0\n"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("target"));
    assert!(!dir.path().join("uploads").exists());
}

#[tokio::test]
async fn test_retrain_rejects_non_csv() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, post_csv_upload("/retrain", "extra.txt", "a,b\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "File must be a CSV");
}

#[tokio::test]
async fn test_retrain_appends_upload_to_base() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(
        &app,
        post_csv_upload("/retrain", "../my houses.csv", &housing_csv(20)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    // 60 base rows + 20 uploaded rows, 80% kept for training
    assert_eq!(body["metrics"]["training_samples"], 64);

    let uploads: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].ends_with("_my_houses.csv"));

    let info = state.service.info().unwrap();
    assert_eq!(info.metadata.user_data_file.as_deref(), Some(uploads[0].as_str()));
}

#[tokio::test]
async fn test_retrain_without_base_uses_upload_only() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), false).await;

    let (status, body) = send(&app, post_csv_upload("/retrain", "extra.csv", &housing_csv(20))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["metrics"]["training_samples"], 16);
}

#[tokio::test]
async fn test_trend_predict() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, post_json("/trend/predict", json!({"years_from_now": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["years_from_now"], 5);
    assert!(body["predicted_price"].as_f64().unwrap() > 300_000.0);
}

#[tokio::test]
async fn test_healthz_degraded_until_trained() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");

    send(&app, post_empty("/train")).await;
    let (_, body) = send(&app, get("/healthz")).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["model"]["status"], "healthy");
}

#[tokio::test]
async fn test_training_clears_startup_store_failure() {
    let dir = TempDir::new().unwrap();
    let (app, state) = setup_test_app(dir.path(), true).await;
    state
        .health_registry
        .set_degraded(components::ARTIFACT_STORE, "checksum mismatch for scaler.json")
        .await;

    let (_, body) = send(&app, get("/healthz")).await;
    assert_eq!(body["components"]["artifact_store"]["status"], "degraded");

    let (status, _) = send(&app, post_empty("/train")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/healthz")).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["artifact_store"]["status"], "healthy");
}

#[tokio::test]
async fn test_readyz() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;

    let (status, body) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let dir = TempDir::new().unwrap();
    let (app, _) = setup_test_app(dir.path(), true).await;
    send(&app, post_empty("/train")).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("house_price_training_runs_total"));
}
