//! Server configuration

use anyhow::{Context, Result};
use price_lib::{ModelKind, StoreConfig, TrainOptions};
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration, read from `PRICE_*` environment variables and an
/// optional `price-server.{toml,yaml,json}` file in the working directory
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding versioned artifact bundles
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Base dataset for `/train` and the optional base for `/retrain`
    #[serde(default = "default_base_data_path")]
    pub base_data_path: PathBuf,

    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default)]
    pub model_type: ModelKind,

    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_versions_to_keep")]
    pub versions_to_keep: usize,

    /// Refuse to start without a trained bundle on disk
    #[serde(default)]
    pub require_model: bool,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_api_port() -> u16 {
    8000
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_base_data_path() -> PathBuf {
    PathBuf::from("data/california_housing.csv")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_n_estimators() -> usize {
    price_lib::predictor::DEFAULT_N_ESTIMATORS
}

fn default_versions_to_keep() -> usize {
    5
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            models_dir: default_models_dir(),
            base_data_path: default_base_data_path(),
            uploads_dir: default_uploads_dir(),
            model_type: ModelKind::default(),
            n_estimators: default_n_estimators(),
            versions_to_keep: default_versions_to_keep(),
            require_model: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("price-server").required(false))
            .add_source(config::Environment::with_prefix("PRICE").try_parsing(true))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            models_dir: self.models_dir.clone(),
            versions_to_keep: self.versions_to_keep,
        }
    }

    /// Training options, with an optional per-request model type
    pub fn train_options(&self, model_type: Option<ModelKind>) -> TrainOptions {
        TrainOptions {
            model_kind: model_type.unwrap_or(self.model_type),
            n_estimators: self.n_estimators,
            ..TrainOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.model_type, ModelKind::RandomForest);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(!config.require_model);
    }

    #[test]
    fn test_train_options_override() {
        let config = ServerConfig {
            n_estimators: 7,
            ..ServerConfig::default()
        };
        let options = config.train_options(Some(ModelKind::Linear));
        assert_eq!(options.model_kind, ModelKind::Linear);
        assert_eq!(options.n_estimators, 7);
        assert_eq!(config.train_options(None).model_kind, ModelKind::RandomForest);
    }
}
