//! Artifacts handed between pipeline stages, and the persisted model file.

use crate::algorithms::{Algorithm, Estimator};
use crate::error::{MlError, Result};
use crate::training::search::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Suffix appended to a model artifact's URI to name the model file.
pub const MODEL_FILE_SUFFIX: &str = ".model.json";

/// A reference to a file produced by one stage and consumed by another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Artifact rooted at `dir/name`.
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Self::new(name, dir.join(name).to_string_lossy().into_owned())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.uri)
    }

    /// Location of the serialized model for a model artifact.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{MODEL_FILE_SUFFIX}", self.uri))
    }

    /// Directory containing the artifact file.
    pub fn directory(&self) -> PathBuf {
        self.path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Training summary stored with a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub best_score: f64,
    pub training_accuracy: f64,
}

/// The serialized contents of a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub framework: String,
    pub algorithm: Algorithm,
    pub created_at: DateTime<Utc>,
    pub best_params: Params,
    pub metrics: ModelMetrics,
    pub estimator: Estimator,
}

impl ModelFile {
    pub fn new(estimator: Estimator, best_params: Params, metrics: ModelMetrics) -> Self {
        let algorithm = estimator.algorithm();
        Self {
            framework: algorithm.framework().to_string(),
            algorithm,
            created_at: Utc::now(),
            best_params,
            metrics,
            estimator,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        mlplatform_core::persistence::atomic_write_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        mlplatform_core::persistence::load_json(path)?
            .ok_or_else(|| MlError::not_found(format!("model file {}", path.display())))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{Cell, Dataset};
    use tempfile::TempDir;

    #[test]
    fn test_artifact_paths() {
        let artifact = Artifact::new("model", "/runs/1/train/model");
        assert_eq!(artifact.model_path(), PathBuf::from("/runs/1/train/model.model.json"));
        assert_eq!(artifact.directory(), PathBuf::from("/runs/1/train"));
    }

    #[test]
    fn test_model_file_save_load() {
        let dir = TempDir::new().unwrap();
        let ds = Dataset::new(
            vec!["x".into(), "y".into()],
            (0..10)
                .map(|i| vec![Cell::Number(i as f64), Cell::Number(f64::from(u8::from(i >= 5)))])
                .collect(),
        )
        .unwrap();
        let (features, labels) = ds.split_label().unwrap();
        let estimator =
            Estimator::fit(Algorithm::DecisionTree, &Params::new(), 0, &features, &labels).unwrap();
        let file = ModelFile::new(
            estimator,
            Params::new(),
            ModelMetrics {
                best_score: 1.0,
                training_accuracy: 1.0,
            },
        );

        let artifact = Artifact::in_dir(dir.path(), "model");
        file.save(&artifact.model_path()).unwrap();
        let loaded = ModelFile::load(&artifact.model_path()).unwrap();
        assert_eq!(loaded.framework, "DecisionTree");
        assert_eq!(loaded.estimator.predict(&features).unwrap(), labels);

        assert!(ModelFile::load(&dir.path().join("absent.model.json")).is_err());
    }
}
