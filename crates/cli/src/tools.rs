//! Plain-text tool functions for conversational front ends
//!
//! Each tool calls the prediction API and always returns a human-readable
//! string, turning failures into an explanatory message instead of an error.

use crate::client::{ApiClient, ClientError};
use crate::output::format_currency;
use price_lib::predictor::PRICE_SCALE;
use price_lib::FeatureMap;

/// California housing features with the defaults used when a value is omitted
#[derive(Debug, Clone, PartialEq)]
pub struct HousingFeatures {
    pub med_inc: f64,
    pub house_age: f64,
    pub ave_rooms: f64,
    pub ave_bedrms: f64,
    pub population: f64,
    pub ave_occup: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for HousingFeatures {
    fn default() -> Self {
        Self {
            med_inc: 3.0,
            house_age: 20.0,
            ave_rooms: 5.0,
            ave_bedrms: 1.0,
            population: 1000.0,
            ave_occup: 3.0,
            latitude: 34.0,
            longitude: -118.0,
        }
    }
}

impl HousingFeatures {
    pub fn to_feature_map(&self) -> FeatureMap {
        [
            ("MedInc", self.med_inc),
            ("HouseAge", self.house_age),
            ("AveRooms", self.ave_rooms),
            ("AveBedrms", self.ave_bedrms),
            ("Population", self.population),
            ("AveOccup", self.ave_occup),
            ("Latitude", self.latitude),
            ("Longitude", self.longitude),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

fn describe_failure(client: &ApiClient, context: &str, error: &ClientError) -> String {
    match error {
        ClientError::UpstreamUnavailable { .. } => format!(
            "Error: Could not connect to the prediction API. Make sure the server is running on {}",
            client.base_url().as_str().trim_end_matches('/')
        ),
        other => format!("{}: {}", context, other),
    }
}

pub async fn predict_housing_price(client: &ApiClient, features: &FeatureMap) -> String {
    match client.predict(features).await {
        Ok(prediction) => format!(
            "The predicted housing price is {} based on the provided features.",
            format_currency(prediction.predicted_price)
        ),
        Err(e) => describe_failure(client, "Error calling prediction API", &e),
    }
}

pub async fn predict_future_home_price(client: &ApiClient, years_from_now: i64) -> String {
    match client.trend(years_from_now).await {
        Ok(prediction) => format!(
            "The predicted average home price in {} year(s) from now is {}",
            years_from_now,
            format_currency(prediction.predicted_price)
        ),
        Err(e) => describe_failure(client, "Error calling prediction API", &e),
    }
}

pub async fn get_model_info(client: &ApiClient) -> String {
    let info = match client.model_info().await {
        Ok(info) if info.model_loaded => info,
        Ok(_) => return "No model is currently loaded.".to_string(),
        Err(e) if e.is_model_not_loaded() => return "No model is currently loaded.".to_string(),
        Err(e) => return describe_failure(client, "Error getting model info", &e),
    };

    let metrics = info.metadata.metrics;
    let lines = [
        "Model Information:".to_string(),
        format!("Features: {}", info.feature_names.join(", ")),
        String::new(),
        "Performance Metrics:".to_string(),
        format!("  - R² Score: {:.4}", metrics.r2),
        format!("  - RMSE: {}", format_currency(metrics.rmse * PRICE_SCALE)),
        format!("  - MAE: {}", format_currency(metrics.mae * PRICE_SCALE)),
        format!("Training Samples: {}", info.metadata.training_samples),
    ];
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_features() {
        let map = HousingFeatures::default().to_feature_map();
        assert_eq!(map.len(), 8);
        assert_eq!(map["MedInc"], 3.0);
        assert_eq!(map["Population"], 1000.0);
        assert_eq!(map["Longitude"], -118.0);
    }

    #[tokio::test]
    async fn test_predict_housing_price_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"features":{"MedInc":3.0}}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predicted_price":412345.678,"features_used":{"MedInc":3.0}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let message =
            predict_housing_price(&client, &HousingFeatures::default().to_feature_map()).await;
        mock.assert_async().await;
        assert_eq!(
            message,
            "The predicted housing price is $412,345.68 based on the provided features."
        );
    }

    #[tokio::test]
    async fn test_future_price_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/trend/predict")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"years_from_now":5,"predicted_price":375120.5}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert_eq!(
            predict_future_home_price(&client, 5).await,
            "The predicted average home price in 5 year(s) from now is $375,120.50"
        );
    }

    #[tokio::test]
    async fn test_model_info_not_loaded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/model/info")
            .with_status(503)
            .with_body(r#"{"detail":"Model not loaded. Please train a model first."}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert_eq!(get_model_info(&client).await, "No model is currently loaded.");
    }

    #[tokio::test]
    async fn test_model_info_summary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/model/info")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model_loaded":true,"feature_names":["MedInc","HouseAge"],
                "metadata":{"model_type":"random_forest","features":["MedInc","HouseAge"],
                "metrics":{"rmse":0.5,"mae":0.25,"r2":0.81234,"training_samples":16512},
                "training_samples":16512}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let text = get_model_info(&client).await;
        assert!(text.starts_with("Model Information:\nFeatures: MedInc, HouseAge\n"));
        assert!(text.contains("R² Score: 0.8123"));
        assert!(text.contains("RMSE: $50,000.00"));
        assert!(text.contains("MAE: $25,000.00"));
        assert!(text.contains("Training Samples: 16512"));
    }

    #[tokio::test]
    async fn test_unreachable_server_message() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let message = predict_housing_price(&client, &FeatureMap::new()).await;
        assert!(message.starts_with("Error: Could not connect to the prediction API"));
        assert!(message.ends_with("http://127.0.0.1:9"));
    }
}
