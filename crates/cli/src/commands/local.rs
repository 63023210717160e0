//! Offline training straight into a local models directory

use anyhow::{Context, Result};
use price_lib::{training, ArtifactStore, ModelKind, StoreConfig, Table, TrainOptions};
use serde::Serialize;
use std::path::PathBuf;

use crate::output::{color_r2, print_fields, print_json, print_success, OutputFormat};

#[derive(Debug, Serialize)]
pub struct LocalTrainSummary {
    pub version: String,
    pub models_dir: PathBuf,
    pub model_type: ModelKind,
    pub metrics: price_lib::TrainingMetrics,
    pub feature_names: Vec<String>,
}

/// Train on a local CSV and save the bundle as the new current version
pub fn train_local(data: PathBuf, models_dir: PathBuf, options: TrainOptions) -> Result<LocalTrainSummary> {
    let table = Table::from_csv_path(&data)
        .with_context(|| format!("Failed to load dataset {}", data.display()))?;
    let outcome = training::train(&table, &options).context("Training failed")?;

    let store = ArtifactStore::new(StoreConfig {
        models_dir: models_dir.clone(),
        ..StoreConfig::default()
    })
    .with_context(|| format!("Failed to open models directory {}", models_dir.display()))?;
    let version = store.save(&outcome.bundle).context("Failed to save model bundle")?;

    Ok(LocalTrainSummary {
        version,
        models_dir,
        model_type: options.model_kind,
        metrics: outcome.metrics,
        feature_names: outcome.bundle.schema().names().to_vec(),
    })
}

pub async fn run(
    data: PathBuf,
    models_dir: PathBuf,
    options: TrainOptions,
    format: OutputFormat,
) -> Result<()> {
    let summary = tokio::task::spawn_blocking(move || train_local(data, models_dir, options))
        .await
        .context("Training task panicked")??;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Saved {} to {}",
                summary.version,
                summary.models_dir.display()
            ));
            print_fields(&[
                ("Model", summary.model_type.label().to_string()),
                ("Training samples", summary.metrics.training_samples.to_string()),
                ("R²", color_r2(summary.metrics.r2)),
                ("RMSE", format!("{:.4}", summary.metrics.rmse)),
                ("MAE", format!("{:.4}", summary.metrics.mae)),
                ("Features", summary.feature_names.join(", ")),
            ]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_train_local_writes_loadable_bundle() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("train.csv");
        let mut csv = String::from("MedInc,HouseAge,target\n");
        for i in 0..30 {
            let x = i as f64;
            csv.push_str(&format!("{},{},{}\n", x, (i * 7 % 11) as f64, 0.1 * x + 1.0));
        }
        std::fs::write(&data, csv).unwrap();

        let models_dir = dir.path().join("models");
        let options = TrainOptions {
            model_kind: ModelKind::Linear,
            ..TrainOptions::default()
        };
        let summary = train_local(data, models_dir.clone(), options).unwrap();
        assert_eq!(summary.version, "v0001");
        assert_eq!(summary.feature_names, vec!["MedInc", "HouseAge"]);

        let store = ArtifactStore::new(StoreConfig {
            models_dir,
            ..StoreConfig::default()
        })
        .unwrap();
        let bundle = store.load().unwrap().unwrap();
        assert_eq!(bundle.metadata().model_type, ModelKind::Linear);
    }

    #[test]
    fn test_missing_dataset_is_error() {
        let dir = TempDir::new().unwrap();
        let err = train_local(
            dir.path().join("missing.csv"),
            dir.path().join("models"),
            TrainOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to load dataset"));
    }
}
