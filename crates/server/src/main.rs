//! House price prediction server
//!
//! Loads the current artifact bundle (if any) and serves the prediction,
//! training and health API until interrupted.

use anyhow::{Context, Result};
use price_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    ArtifactStore, ModelService, PriceTrendModel,
};
use price_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting price-server");

    let config = ServerConfig::load()?;
    info!(
        port = config.api_port,
        models_dir = %config.models_dir.display(),
        model_type = %config.model_type,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    let store = ArtifactStore::new(config.store_config()).with_context(|| {
        format!("Failed to open models directory {}", config.models_dir.display())
    })?;
    let service = Arc::new(ModelService::new(store));

    let mut load_error = None;
    match service.load_from_disk() {
        Ok(Some(version)) => info!(version = %version, "Loaded model from disk"),
        Ok(None) if config.require_model => {
            anyhow::bail!(
                "No trained model found in {} and require_model is set",
                config.models_dir.display()
            );
        }
        Ok(None) => warn!("No trained model found; POST /train to create one"),
        Err(e) if config.require_model => {
            return Err(e).context("Failed to load model bundle");
        }
        Err(e) => {
            warn!(error = %e, "Failed to load model bundle, starting without one");
            load_error = Some(e.to_string());
        }
    }
    api::init_health(&health_registry, &service).await;
    if let Some(error) = load_error {
        health_registry
            .set_degraded(components::ARTIFACT_STORE, error)
            .await;
    }

    let trend = PriceTrendModel::train().context("Failed to fit price trend model")?;

    let logger = StructuredLogger::new("price-server");
    let model_version = service.current().and_then(|b| b.version().map(str::to_string));
    logger.log_startup(SERVER_VERSION, model_version.as_deref());

    let port = config.api_port;
    let app_state = Arc::new(api::AppState::new(
        service,
        health_registry.clone(),
        trend,
        config,
    ));

    health_registry.set_ready(true).await;

    api::serve(port, app_state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
