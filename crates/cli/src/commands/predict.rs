//! Prediction commands

use anyhow::{bail, Context, Result};
use price_lib::{FeatureMap, Table, LABEL_COLUMN};
use serde::Deserialize;
use std::path::Path;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_currency, print_fields, print_json, print_success, print_table, OutputFormat};

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Predicted Price")]
    price: String,
}

/// Parse a `NAME=VALUE` feature override
pub fn parse_feature(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{}'", raw));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((name.to_string(), value))
}

pub async fn predict(client: &ApiClient, features: FeatureMap, format: OutputFormat) -> Result<()> {
    let prediction = client.predict(&features).await?;

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Predicted price: {}",
                format_currency(prediction.predicted_price)
            ));
            let fields: Vec<(&str, String)> = prediction
                .features_used
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect();
            print_fields(&fields);
        }
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BulkFile {
    Wrapped { data: Vec<FeatureMap> },
    Rows(Vec<FeatureMap>),
}

/// Rows from a JSON array, a `{"data": [...]}` object or a CSV file.
///
/// CSV cells that are empty are left out of the row and the label column is
/// ignored, so a training file can be scored as-is.
pub fn read_rows(path: &Path) -> Result<Vec<FeatureMap>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let rows = match serde_json::from_str::<BulkFile>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
            {
                BulkFile::Wrapped { data } => data,
                BulkFile::Rows(rows) => rows,
            };
            Ok(rows)
        }
        "csv" => {
            let table = Table::from_csv_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(table_records(&table))
        }
        other => bail!("Unsupported file type '{}': use .json or .csv", other),
    }
}

fn table_records(table: &Table) -> Vec<FeatureMap> {
    table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(row)
                .filter(|(name, _)| name.as_str() != LABEL_COLUMN)
                .filter_map(|(name, cell)| cell.map(|v| (name.clone(), v)))
                .collect()
        })
        .collect()
}

pub async fn predict_bulk(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let rows = read_rows(path)?;
    let result = client.predict_bulk(&rows).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let rows: Vec<PredictionRow> = result
                .predictions
                .iter()
                .enumerate()
                .map(|(index, price)| PredictionRow {
                    index: index + 1,
                    price: format_currency(*price),
                })
                .collect();
            print_table(rows, "No rows to predict");
            println!("\nTotal: {} predictions", result.count);
        }
    }

    Ok(())
}

pub async fn trend(client: &ApiClient, years_from_now: i64, format: OutputFormat) -> Result<()> {
    let prediction = client.trend(years_from_now).await?;

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => print_success(&format!(
            "Predicted average home price in {} year(s): {}",
            prediction.years_from_now,
            format_currency(prediction.predicted_price)
        )),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_feature() {
        assert_eq!(parse_feature("MedInc=4.5").unwrap(), ("MedInc".to_string(), 4.5));
        assert_eq!(parse_feature(" Rooms = -2 ").unwrap(), ("Rooms".to_string(), -2.0));
        assert!(parse_feature("MedInc").is_err());
        assert!(parse_feature("=1").is_err());
        assert!(parse_feature("MedInc=high").is_err());
    }

    #[test]
    fn test_read_json_rows_both_shapes() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("rows.json");
        std::fs::write(&plain, r#"[{"MedInc": 1.0}, {"MedInc": 2.0}]"#).unwrap();
        assert_eq!(read_rows(&plain).unwrap().len(), 2);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&wrapped, r#"{"data": [{"HouseAge": 9.0}]}"#).unwrap();
        let rows = read_rows(&wrapped).unwrap();
        assert_eq!(rows[0]["HouseAge"], 9.0);
    }

    #[test]
    fn test_read_csv_rows_skips_label_and_blanks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "MedInc,HouseAge,target\n1.5,,2.0\n3.0,10,1.0\n").unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0]["MedInc"], 1.5);
        assert!(!rows[1].contains_key("target"));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.parquet");
        std::fs::write(&path, "").unwrap();
        assert!(read_rows(&path).is_err());
    }
}
