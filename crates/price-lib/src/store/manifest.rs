use crate::error::{PredictorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// SHA-256 of every artifact file in one version directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            created_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, name: &str, bytes: &[u8]) {
        self.files.insert(name.to_string(), compute_checksum(bytes));
    }

    /// Check `bytes` against the recorded checksum for `name`
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let expected = self.files.get(name).ok_or_else(|| {
            PredictorError::CorruptArtifact(format!("{} is not listed in the manifest", name))
        })?;
        let actual = compute_checksum(bytes);
        if *expected != actual {
            return Err(PredictorError::CorruptArtifact(format!(
                "checksum mismatch for {}: expected {}, got {}",
                name, expected, actual
            )));
        }
        Ok(())
    }
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
