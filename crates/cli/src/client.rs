//! API client for the house price prediction server

use price_lib::{BulkPrediction, FeatureMap, ModelInfo, ModelKind, PricePrediction, TrainingMetrics, TrendPrediction};
use reqwest::{multipart, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Training can run for minutes on the full dataset
const TRAIN_TIMEOUT: Duration = Duration::from_secs(600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid API URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Could not connect to the prediction API at {url}: {message}")]
    UpstreamUnavailable { url: String, message: String },

    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ClientError {
    /// True when the server answered 503 because no model is loaded
    pub fn is_model_not_loaded(&self) -> bool {
        matches!(self, ClientError::Api { status: 503, .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub message: String,
    pub version: String,
    pub model_type: ModelKind,
    pub metrics: TrainingMetrics,
    pub feature_names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    features: &'a FeatureMap,
}

#[derive(Debug, Serialize)]
struct BulkPredictRequest<'a> {
    data: &'a [FeatureMap],
}

#[derive(Debug, Serialize)]
struct TrendRequest {
    years_from_now: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: String,
}

/// API client for the prediction server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;

        // Join relative paths under any base path instead of replacing it
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::InvalidUrl {
                url: path.to_string(),
                source,
            })
    }

    async fn send<T: DeserializeOwned>(&self, url: Url, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await.map_err(|e| ClientError::UpstreamUnavailable {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        response.json().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path)?;
        self.send(url.clone(), self.client.get(url)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let url = self.url(path)?;
        self.send(url.clone(), self.client.post(url).json(body)).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get("health").await
    }

    pub async fn predict(&self, features: &FeatureMap) -> Result<PricePrediction, ClientError> {
        self.post("predict", &PredictRequest { features }).await
    }

    pub async fn predict_bulk(&self, rows: &[FeatureMap]) -> Result<BulkPrediction, ClientError> {
        self.post("predict/bulk", &BulkPredictRequest { data: rows }).await
    }

    pub async fn model_info(&self) -> Result<ModelInfo, ClientError> {
        self.get("model/info").await
    }

    pub async fn trend(&self, years_from_now: i64) -> Result<TrendPrediction, ClientError> {
        self.post("trend/predict", &TrendRequest { years_from_now }).await
    }

    pub async fn train(&self, model_type: Option<ModelKind>) -> Result<TrainResponse, ClientError> {
        let mut url = self.url("train")?;
        if let Some(kind) = model_type {
            url.query_pairs_mut().append_pair("model_type", &kind.to_string());
        }
        let request = self.client.post(url.clone()).timeout(TRAIN_TIMEOUT);
        self.send(url, request).await
    }

    /// Upload a CSV with a `target` column and retrain on base plus upload
    pub async fn retrain(&self, csv_path: &Path, model_type: Option<ModelKind>) -> Result<TrainResponse, ClientError> {
        let bytes = tokio::fs::read(csv_path).await.map_err(|source| ClientError::Io {
            path: csv_path.display().to_string(),
            source,
        })?;
        let file_name = csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| ClientError::Request(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let mut url = self.url("retrain")?;
        if let Some(kind) = model_type {
            url.query_pairs_mut().append_pair("model_type", &kind.to_string());
        }
        let request = self
            .client
            .post(url.clone())
            .multipart(form)
            .timeout(TRAIN_TIMEOUT);
        self.send(url, request).await
    }
}
