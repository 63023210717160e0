//! The co-versioned unit of model, scaler, feature schema and metadata

use crate::error::{PredictorError, Result};
use crate::models::{FeatureSchema, Metadata};
use crate::predictor::{Model, Regressor, ScalerState};

/// Everything needed to serve predictions.
///
/// The three component widths are checked on construction, so a bundle
/// whose schema does not match its model or scaler cannot exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    model: Model,
    scaler: ScalerState,
    schema: FeatureSchema,
    metadata: Metadata,
}

impl ArtifactBundle {
    pub fn new(
        model: Model,
        scaler: ScalerState,
        schema: FeatureSchema,
        metadata: Metadata,
    ) -> Result<Self> {
        let width = schema.len();
        if scaler.width() != width || scaler.scale.len() != width {
            return Err(PredictorError::CorruptArtifact(format!(
                "scaler covers {} features but schema has {}",
                scaler.width(),
                width
            )));
        }
        if !scaler.medians.is_empty() && scaler.medians.len() != width {
            return Err(PredictorError::CorruptArtifact(format!(
                "scaler holds {} medians but schema has {}",
                scaler.medians.len(),
                width
            )));
        }
        if model.n_features() != width {
            return Err(PredictorError::CorruptArtifact(format!(
                "model expects {} features but schema has {}",
                model.n_features(),
                width
            )));
        }
        Ok(Self {
            model,
            scaler,
            schema,
            metadata,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.version.as_deref()
    }

    /// Same bundle tagged with a store version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = Some(version.into());
        self
    }
}
