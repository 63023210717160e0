//! Versioned on-disk artifact store
//!
//! Each save lands in its own version directory, staged under a hidden name
//! and renamed into place once every file is synced. The `CURRENT` pointer
//! file is replaced last, so a reader sees either the previous bundle or the
//! new one, never a mix.

mod manifest;

pub use manifest::Manifest;

use crate::bundle::ArtifactBundle;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureSchema, Metadata};
use crate::predictor::{Model, ScalerState};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CURRENT_FILE: &str = "CURRENT";
pub const MODEL_FILE: &str = "housing_model.bin";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURES_FILE: &str = "feature_names.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub models_dir: PathBuf,
    /// Number of version directories retained, including the current one
    pub versions_to_keep: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            versions_to_keep: 5,
        }
    }
}

/// Filesystem-backed store of [`ArtifactBundle`] versions
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: StoreConfig,
}

impl ArtifactStore {
    /// Open the store, creating the models directory if needed
    pub fn new(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.models_dir)
            .map_err(|e| PredictorError::io(&config.models_dir, e))?;
        let store = Self { config };
        store.clean_staging();
        Ok(store)
    }

    pub fn models_dir(&self) -> &Path {
        &self.config.models_dir
    }

    /// Persist a bundle as a new version and make it current
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<String> {
        let version = self.next_version()?;
        let staging = self.config.models_dir.join(format!("{}{}", STAGING_PREFIX, version));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| PredictorError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| PredictorError::io(&staging, e))?;

        let bundle = bundle.clone().with_version(version.clone());
        let mut manifest = Manifest::new(&version);

        let model_bytes = bincode::serialize(bundle.model())?;
        write_synced(&staging.join(MODEL_FILE), &model_bytes)?;
        manifest.record(MODEL_FILE, &model_bytes);

        for (name, bytes) in [
            (SCALER_FILE, serde_json::to_vec_pretty(bundle.scaler())?),
            (FEATURES_FILE, serde_json::to_vec_pretty(bundle.schema())?),
            (METADATA_FILE, serde_json::to_vec_pretty(bundle.metadata())?),
        ] {
            write_synced(&staging.join(name), &bytes)?;
            manifest.record(name, &bytes);
        }

        write_synced(&staging.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        sync_dir(&staging)?;

        let final_dir = self.config.models_dir.join(&version);
        fs::rename(&staging, &final_dir).map_err(|e| PredictorError::io(&final_dir, e))?;

        let pointer_tmp = self.config.models_dir.join(format!("{}.tmp", CURRENT_FILE));
        let pointer = self.config.models_dir.join(CURRENT_FILE);
        write_synced(&pointer_tmp, version.as_bytes())?;
        fs::rename(&pointer_tmp, &pointer).map_err(|e| PredictorError::io(&pointer, e))?;
        sync_dir(&self.config.models_dir)?;

        info!(
            version = %version,
            path = %final_dir.display(),
            model_type = %bundle.model().kind(),
            "Artifact bundle saved"
        );

        self.prune(&version);
        Ok(version)
    }

    /// Load the current bundle.
    ///
    /// `Ok(None)` means nothing has been saved yet: either there is no
    /// `CURRENT` pointer or its version has no model file.
    pub fn load(&self) -> Result<Option<ArtifactBundle>> {
        let Some(version) = self.current_version()? else {
            debug!(dir = %self.config.models_dir.display(), "No current model version");
            return Ok(None);
        };
        let dir = self.config.models_dir.join(&version);
        let model_path = dir.join(MODEL_FILE);
        let model_bytes = match fs::read(&model_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(version = %version, "Current version has no model file");
                return Ok(None);
            }
            Err(e) => return Err(PredictorError::io(&model_path, e)),
        };

        let scaler_bytes = read_required(&dir, SCALER_FILE)?;
        let schema_bytes = read_required(&dir, FEATURES_FILE)?;
        let metadata_bytes = read_optional(&dir.join(METADATA_FILE))?;

        let manifest_bytes = read_required(&dir, MANIFEST_FILE)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
            PredictorError::CorruptArtifact(format!("unreadable {}: {}", MANIFEST_FILE, e))
        })?;
        manifest.verify(MODEL_FILE, &model_bytes)?;
        manifest.verify(SCALER_FILE, &scaler_bytes)?;
        manifest.verify(FEATURES_FILE, &schema_bytes)?;
        if let Some(bytes) = &metadata_bytes {
            manifest.verify(METADATA_FILE, bytes)?;
        }

        let model: Model = bincode::deserialize(&model_bytes).map_err(|e| {
            PredictorError::CorruptArtifact(format!("unreadable {}: {}", MODEL_FILE, e))
        })?;
        let scaler: ScalerState = parse_json(SCALER_FILE, &scaler_bytes)?;
        let schema: FeatureSchema = parse_json(FEATURES_FILE, &schema_bytes)?;
        let metadata = match metadata_bytes {
            Some(bytes) => parse_json::<Metadata>(METADATA_FILE, &bytes)?,
            None => {
                warn!(version = %version, "Metadata file missing, using defaults");
                Metadata {
                    model_type: model.kind(),
                    features: schema.names().to_vec(),
                    ..Metadata::default()
                }
            }
        };

        let bundle = ArtifactBundle::new(model, scaler, schema, metadata)?.with_version(version.clone());
        info!(version = %version, features = bundle.schema().len(), "Artifact bundle loaded");
        Ok(Some(bundle))
    }

    /// Version named by the `CURRENT` pointer, if any
    pub fn current_version(&self) -> Result<Option<String>> {
        let pointer = self.config.models_dir.join(CURRENT_FILE);
        match fs::read_to_string(&pointer) {
            Ok(contents) => {
                let version = contents.trim();
                Ok((!version.is_empty()).then(|| version.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PredictorError::io(&pointer, e)),
        }
    }

    /// All committed version directories, oldest first
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.config.models_dir)
            .map_err(|e| PredictorError::io(&self.config.models_dir, e))?;
        let mut versions: Vec<(u32, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                parse_version(&name).map(|n| (n, name))
            })
            .collect();
        versions.sort();
        Ok(versions.into_iter().map(|(_, name)| name).collect())
    }

    fn next_version(&self) -> Result<String> {
        let last = self
            .list_versions()?
            .iter()
            .filter_map(|v| parse_version(v))
            .max()
            .unwrap_or(0);
        Ok(format_version(last + 1))
    }

    /// Remove versions beyond the retention limit. Never removes `current`.
    fn prune(&self, current: &str) {
        let keep = self.config.versions_to_keep.max(1);
        let versions = match self.list_versions() {
            Ok(versions) => versions,
            Err(e) => {
                warn!(error = %e, "Failed to list versions for pruning");
                return;
            }
        };
        if versions.len() <= keep {
            return;
        }
        let excess = versions.len() - keep;
        for version in versions.iter().take(excess).filter(|v| v.as_str() != current) {
            let path = self.config.models_dir.join(version);
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(version = %version, "Pruned old model version"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove old model version"
                ),
            }
        }
    }

    /// Leftovers of an interrupted save
    fn clean_staging(&self) {
        let Ok(entries) = fs::read_dir(&self.config.models_dir) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                let path = entry.path();
                if let Err(e) = fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
                }
            }
        }
    }
}

fn format_version(n: u32) -> String {
    format!("v{:04}", n)
}

fn parse_version(name: &str) -> Option<u32> {
    name.strip_prefix('v')
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| PredictorError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PredictorError::io(path, e))?;
    file.sync_all().map_err(|e| PredictorError::io(path, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| PredictorError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn read_required(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = dir.join(name);
    read_optional(&path)?.ok_or_else(|| {
        PredictorError::CorruptArtifact(format!("{} is missing from {}", name, dir.display()))
    })
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PredictorError::io(path, e)),
    }
}

fn parse_json<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PredictorError::CorruptArtifact(format!("unreadable {}: {}", name, e)))
}
