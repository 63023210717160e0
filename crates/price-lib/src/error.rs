//! Error types for training, persistence and prediction

use std::path::PathBuf;

/// Result alias used throughout the library
pub type Result<T, E = PredictorError> = std::result::Result<T, E>;

/// Errors surfaced by the predictor core.
///
/// None of these are process-fatal; callers map them to service-level
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    /// A prediction was requested but no artifact bundle is loaded
    #[error("Model not loaded. Please train a model first.")]
    ModelNotLoaded,

    /// Input could not be aligned to the stored feature schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A bundle on disk is partial or fails validation
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// Training input is missing a required column
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Input values could not be parsed or are not finite
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not enough rows to fit or evaluate a model
    #[error("Insufficient data: need at least {needed} rows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A background task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PredictorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PredictorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable kind, used for metrics labels and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictorError::ModelNotLoaded => "model_not_loaded",
            PredictorError::SchemaMismatch(_) => "schema_mismatch",
            PredictorError::CorruptArtifact(_) => "corrupt_artifact",
            PredictorError::SchemaViolation(_) => "schema_violation",
            PredictorError::InvalidData(_) => "invalid_data",
            PredictorError::InsufficientData { .. } => "insufficient_data",
            PredictorError::Io { .. } => "io",
            PredictorError::Serialization(_) => "serialization",
            PredictorError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(err: serde_json::Error) -> Self {
        PredictorError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for PredictorError {
    fn from(err: bincode::Error) -> Self {
        PredictorError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert!(PredictorError::ModelNotLoaded
            .to_string()
            .contains("Model not loaded"));
        let err = PredictorError::InsufficientData { needed: 2, got: 1 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: need at least 2 rows, got 1"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PredictorError::SchemaViolation("x".into()).kind(),
            "schema_violation"
        );
        assert_eq!(
            PredictorError::CorruptArtifact("x".into()).kind(),
            "corrupt_artifact"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: PredictorError = parse.unwrap_err().into();
        assert!(matches!(err, PredictorError::Serialization(_)));
    }
}
