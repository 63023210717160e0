//! Model lifecycle and server status commands

use anyhow::Result;
use price_lib::ModelKind;
use std::path::Path;

use crate::client::{ApiClient, TrainResponse};
use crate::output::{
    color_r2, color_status, print_fields, print_info, print_json, print_success, print_warning,
    OutputFormat,
};
use crate::tools;

pub async fn info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let info = client.model_info().await?;
            print_json(&info)?;
        }
        OutputFormat::Table => {
            let text = tools::get_model_info(client).await;
            if text.starts_with("Model Information") {
                print!("{}", text);
            } else {
                print_warning(&text);
            }
        }
    }

    Ok(())
}

pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            let loaded = if health.model_loaded { "loaded" } else { "not loaded" };
            print_fields(&[
                ("Server", client.base_url().to_string()),
                ("Status", color_status(&health.status)),
                ("Model", color_status(loaded)),
                (
                    "Features",
                    if health.features.is_empty() {
                        "-".to_string()
                    } else {
                        health.features.join(", ")
                    },
                ),
            ]);
        }
    }

    Ok(())
}

pub async fn train(client: &ApiClient, model_type: Option<ModelKind>, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Table {
        print_info("Training on the server's base dataset, this can take a while");
    }
    let response = client.train(model_type).await?;
    print_train_response(&response, format)
}

pub async fn retrain(
    client: &ApiClient,
    csv_path: &Path,
    model_type: Option<ModelKind>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Table {
        print_info(&format!("Uploading {} for retraining", csv_path.display()));
    }
    let response = client.retrain(csv_path, model_type).await?;
    print_train_response(&response, format)
}

fn print_train_response(response: &TrainResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(response)?,
        OutputFormat::Table => {
            print_success(&response.message);
            print_fields(&[
                ("Version", response.version.clone()),
                ("Model", response.model_type.label().to_string()),
                ("Training samples", response.metrics.training_samples.to_string()),
                ("R²", color_r2(response.metrics.r2)),
                ("RMSE", format!("{:.4}", response.metrics.rmse)),
                ("MAE", format!("{:.4}", response.metrics.mae)),
                ("Features", response.feature_names.join(", ")),
            ]);
        }
    }
    Ok(())
}
