//! Configuration for mlplatform.
//!
//! Uses `figment` for layered configuration: built-in defaults -> optional
//! `mlplatform.toml` in the working directory -> environment variables.
//! Every setting is named by its environment variable; required variables
//! have no default, so a missing one fails at load time.

use crate::error::ConfigError;
use crate::locator::GCS_SCHEME;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional configuration file.
pub const CONFIG_FILE: &str = "mlplatform.toml";

/// Environment variables read at process start.
pub const ENV_VARS: &[&str] = &[
    "PIPELINE_ROOT",
    "CONTAINER_IMAGE",
    "SERVING_IMAGE",
    "PROJECT_ID",
    "REGION",
    "SERVICE_ACCOUNT",
    "ARTIFACT_REPO",
    "GCS_URL",
    "TRAIN_RATIO",
    "BUCKET_NAME",
    "MODEL_GCS_PATH",
    "TABLE_REF",
    "STORAGE_ROOT",
    "REGISTRY_DIR",
    "WAREHOUSE_PATH",
    "BATCH_SAMPLE_SIZE",
    "MODEL_DISPLAY_NAME",
    "MACHINE_TYPE",
    "SPLIT_SEED",
];

/// Platform configuration shared by every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Root directory under which pipeline runs write their artifacts.
    pub pipeline_root: String,
    /// Container image the pipeline components run in.
    #[serde(default)]
    pub container_image: Option<String>,
    /// Prebuilt serving container for deployed models.
    #[serde(default)]
    pub serving_image: Option<String>,
    pub project_id: String,
    pub region: String,
    pub service_account: String,
    pub artifact_repo: String,
    /// Locator of the training CSV; also the inference pipeline's input data.
    pub gcs_url: String,
    /// Fraction of cleaned rows assigned to the training partition.
    pub train_ratio: f64,
    pub bucket_name: String,
    /// Locator of the persisted model used by batch prediction.
    pub model_gcs_path: String,
    /// Warehouse table receiving batch predictions.
    pub table_ref: String,

    /// Local directory standing in for object storage buckets.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    /// Directory holding the model registry and endpoint catalogs.
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,
    /// SQLite database standing in for the warehouse.
    #[serde(default = "default_warehouse_path")]
    pub warehouse_path: PathBuf,
    /// Rows sampled by the batch predictor.
    #[serde(default = "default_batch_sample_size")]
    pub batch_sample_size: usize,
    /// Display name used for registered models and endpoints.
    #[serde(default = "default_model_display_name")]
    pub model_display_name: String,
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    /// Seed for the train/test split.
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".mlplatform/storage")
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from(".mlplatform/registry")
}

fn default_warehouse_path() -> PathBuf {
    PathBuf::from(".mlplatform/warehouse.db")
}

fn default_batch_sample_size() -> usize {
    4
}

fn default_model_display_name() -> String {
    "pet-adoption".to_string()
}

fn default_machine_type() -> String {
    "n1-standard-4".to_string()
}

fn default_split_seed() -> u64 {
    42
}

impl PlatformConfig {
    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(map_figment_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Input data for the inference pipeline is the training locator.
    pub fn input_data_gcs_path(&self) -> &str {
        &self.gcs_url
    }

    /// Local directory for pipeline artifacts. A `gs://` root maps under
    /// `storage_root` the same way objects do.
    pub fn pipeline_root_dir(&self) -> PathBuf {
        match self.pipeline_root.strip_prefix(GCS_SCHEME) {
            Some(rest) => rest
                .split('/')
                .filter(|s| !s.is_empty())
                .fold(self.storage_root.clone(), |dir, segment| dir.join(segment)),
            None => PathBuf::from(&self.pipeline_root),
        }
    }

    /// Serving image, or an error naming the variable when it is unset.
    pub fn require_serving_image(&self) -> Result<&str, ConfigError> {
        self.serving_image
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable {
                name: "SERVING_IMAGE".into(),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ConfigError::InvalidValue {
                name: "TRAIN_RATIO".into(),
                message: format!("{} is not in the open interval (0, 1)", self.train_ratio),
            });
        }
        if self.batch_sample_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BATCH_SAMPLE_SIZE".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Load configuration from `mlplatform.toml` (if present in `workspace`)
/// and the process environment.
pub fn load_config(workspace: Option<&Path>) -> Result<PlatformConfig, ConfigError> {
    let mut figment = Figment::new();
    if let Some(ws) = workspace {
        let file = ws.join(CONFIG_FILE);
        if file.exists() {
            figment = figment.merge(Toml::file(&file));
        }
    }
    figment = figment.merge(Env::raw().only(ENV_VARS));
    PlatformConfig::from_figment(figment)
}

fn map_figment_error(err: figment::Error) -> ConfigError {
    match &err.kind {
        figment::error::Kind::MissingField(field) => ConfigError::MissingVariable {
            name: field.to_uppercase(),
        },
        figment::error::Kind::InvalidType(_, _) | figment::error::Kind::InvalidValue(_, _) => {
            ConfigError::InvalidValue {
                name: err
                    .path
                    .last()
                    .map(|p| p.to_uppercase())
                    .unwrap_or_default(),
                message: err.to_string(),
            }
        }
        _ => ConfigError::Extract {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const REQUIRED: &[(&str, &str)] = &[
        ("PIPELINE_ROOT", "runs"),
        ("PROJECT_ID", "ml-platform-dev"),
        ("REGION", "europe-west4"),
        ("SERVICE_ACCOUNT", "pipelines@ml-platform-dev.iam"),
        ("ARTIFACT_REPO", "ml-images"),
        ("GCS_URL", "gs://ml-data/pets/adoption.csv"),
        ("TRAIN_RATIO", "0.7"),
        ("BUCKET_NAME", "ml-data"),
        ("MODEL_GCS_PATH", "gs://ml-data/models/model.model.json"),
        ("TABLE_REF", "ml-platform-dev.predictions.pets"),
    ];

    fn set_required_except(jail: &mut Jail, skip: Option<&str>) {
        for (name, value) in REQUIRED {
            if Some(*name) != skip {
                jail.set_env(name, value);
            }
        }
    }

    fn set_required(jail: &mut Jail) {
        set_required_except(jail, None);
    }

    #[test]
    fn test_load_from_env() {
        Jail::expect_with(|jail| {
            set_required(jail);
            let config = load_config(Some(jail.directory())).expect("config loads");
            assert_eq!(config.project_id, "ml-platform-dev");
            assert_eq!(config.train_ratio, 0.7);
            assert_eq!(config.batch_sample_size, 4);
            assert_eq!(config.split_seed, 42);
            assert_eq!(config.model_display_name, "pet-adoption");
            assert_eq!(config.input_data_gcs_path(), "gs://ml-data/pets/adoption.csv");
            assert!(config.serving_image.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_pipeline_root_dir() {
        Jail::expect_with(|jail| {
            set_required(jail);
            jail.set_env("STORAGE_ROOT", "/data/buckets");
            jail.set_env("PIPELINE_ROOT", "gs://ml-data/pipeline_root/");
            let config = load_config(None).expect("config loads");
            assert_eq!(
                config.pipeline_root_dir(),
                PathBuf::from("/data/buckets/ml-data/pipeline_root")
            );

            jail.set_env("PIPELINE_ROOT", "local/runs");
            let config = load_config(None).expect("config loads");
            assert_eq!(config.pipeline_root_dir(), PathBuf::from("local/runs"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_required_variable() {
        Jail::expect_with(|jail| {
            set_required_except(jail, Some("PROJECT_ID"));
            let err = load_config(None).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::MissingVariable { ref name } if name == "PROJECT_ID"
            ));
            Ok(())
        });
    }

    #[test]
    fn test_train_ratio_out_of_range() {
        Jail::expect_with(|jail| {
            set_required(jail);
            jail.set_env("TRAIN_RATIO", "1.5");
            let err = load_config(None).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref name, .. } if name == "TRAIN_RATIO"
            ));
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_layer_overridden_by_env() {
        Jail::expect_with(|jail| {
            set_required(jail);
            jail.create_file(
                CONFIG_FILE,
                r#"
                    batch_sample_size = 10
                    serving_image = "europe-docker.pkg.dev/serving/sklearn-cpu:latest"
                    region = "us-central1"
                "#,
            )?;
            let config = load_config(Some(jail.directory())).expect("config loads");
            assert_eq!(config.batch_sample_size, 10);
            assert_eq!(
                config.require_serving_image().unwrap(),
                "europe-docker.pkg.dev/serving/sklearn-cpu:latest"
            );
            assert_eq!(config.region, "europe-west4");
            Ok(())
        });
    }
}
