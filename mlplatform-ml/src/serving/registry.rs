//! Model registry and endpoint catalog.
//!
//! Registered models are copied into the registry's own storage, so the
//! registry stays valid after the pipeline's working artifacts are gone.
//! Both catalogs are JSON files rewritten atomically on every change.

use crate::artifact::{Artifact, MODEL_FILE_SUFFIX, ModelFile};
use crate::error::{MlError, Result};
use chrono::{DateTime, Utc};
use mlplatform_core::persistence::{atomic_write, atomic_write_json, load_json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MODELS_FILE: &str = "models.json";
const ENDPOINTS_FILE: &str = "endpoints.json";

/// A model uploaded to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub id: String,
    pub resource_name: String,
    pub display_name: String,
    pub framework: String,
    /// Directory the artifact was uploaded from.
    pub artifact_uri: String,
    /// Registry-managed copy of the model file.
    pub model_file: PathBuf,
    pub sha256: String,
    pub serving_image: String,
    pub health_route: String,
    pub predict_route: String,
    pub env: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// A model deployed onto an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedModel {
    pub id: String,
    pub model_id: String,
    pub display_name: String,
    pub machine_type: String,
    pub traffic_percentage: u32,
    pub deployed_at: DateTime<Utc>,
}

/// A hosted prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub resource_name: String,
    pub display_name: String,
    pub project: String,
    pub region: String,
    pub deployed_models: Vec<DeployedModel>,
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    /// The deployed model receiving the most traffic.
    pub fn primary(&self) -> Option<&DeployedModel> {
        self.deployed_models
            .iter()
            .filter(|d| d.traffic_percentage > 0)
            .max_by_key(|d| d.traffic_percentage)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModelCatalog {
    models: Vec<RegisteredModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EndpointCatalog {
    endpoints: Vec<Endpoint>,
}

/// Parameters for [`ModelRegistry::upload_model`].
#[derive(Debug, Clone)]
pub struct ModelUpload<'a> {
    pub display_name: &'a str,
    pub artifact: &'a Artifact,
    pub serving_image: &'a str,
    pub project: &'a str,
    pub region: &'a str,
}

/// A model loaded for serving from an endpoint.
#[derive(Debug, Clone)]
pub struct ServingModel {
    pub model: RegisteredModel,
    pub deployed: DeployedModel,
    pub file: ModelFile,
}

/// File-backed model registry rooted at a directory.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

impl ModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn models_path(&self) -> PathBuf {
        self.root.join(MODELS_FILE)
    }

    fn endpoints_path(&self) -> PathBuf {
        self.root.join(ENDPOINTS_FILE)
    }

    fn load_models(&self) -> Result<ModelCatalog> {
        Ok(load_json(&self.models_path())?.unwrap_or_default())
    }

    fn load_endpoints(&self) -> Result<EndpointCatalog> {
        Ok(load_json(&self.endpoints_path())?.unwrap_or_default())
    }

    /// Copy a model artifact into the registry and record it.
    pub fn upload_model(&self, upload: ModelUpload<'_>) -> Result<RegisteredModel> {
        let source = upload.artifact.model_path();
        let bytes = std::fs::read(&source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                MlError::not_found(format!("model file {}", source.display()))
            }
            _ => MlError::Io(e),
        })?;
        let file = ModelFile::from_slice(&bytes)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let model_file = self
            .root
            .join("models")
            .join(&id)
            .join(format!("model{MODEL_FILE_SUFFIX}"));
        atomic_write(&model_file, &bytes)?;

        let name = upload.display_name;
        let model = RegisteredModel {
            resource_name: format!(
                "projects/{}/locations/{}/models/{id}",
                upload.project, upload.region
            ),
            id,
            display_name: name.to_string(),
            framework: file.framework,
            artifact_uri: upload.artifact.directory().to_string_lossy().into_owned(),
            model_file,
            sha256: sha256_hex(&bytes),
            serving_image: upload.serving_image.to_string(),
            health_route: format!("/v1/models/{name}"),
            predict_route: format!("/v1/models/{name}:predict"),
            env: BTreeMap::from([("MODEL_NAME".to_string(), name.to_string())]),
            created_at: Utc::now(),
        };

        let mut catalog = self.load_models()?;
        catalog.models.push(model.clone());
        atomic_write_json(&self.models_path(), &catalog)?;
        tracing::info!(
            model = %model.resource_name,
            sha256 = %model.sha256,
            "Registered model"
        );
        Ok(model)
    }

    pub fn list_models(&self) -> Result<Vec<RegisteredModel>> {
        Ok(self.load_models()?.models)
    }

    /// Look up a model by id or resource name.
    pub fn get_model(&self, id: &str) -> Result<RegisteredModel> {
        self.load_models()?
            .models
            .into_iter()
            .find(|m| m.id == id || m.resource_name == id)
            .ok_or_else(|| MlError::not_found(format!("model '{id}'")))
    }

    pub fn create_endpoint(&self, display_name: &str, project: &str, region: &str) -> Result<Endpoint> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let endpoint = Endpoint {
            resource_name: format!("projects/{project}/locations/{region}/endpoints/{id}"),
            id,
            display_name: display_name.to_string(),
            project: project.to_string(),
            region: region.to_string(),
            deployed_models: Vec::new(),
            created_at: Utc::now(),
        };
        let mut catalog = self.load_endpoints()?;
        catalog.endpoints.push(endpoint.clone());
        atomic_write_json(&self.endpoints_path(), &catalog)?;
        tracing::info!(endpoint = %endpoint.resource_name, "Created endpoint");
        Ok(endpoint)
    }

    pub fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.load_endpoints()?.endpoints)
    }

    /// Look up an endpoint by id or resource name.
    pub fn get_endpoint(&self, id: &str) -> Result<Endpoint> {
        self.load_endpoints()?
            .endpoints
            .into_iter()
            .find(|e| e.id == id || e.resource_name == id)
            .ok_or_else(|| MlError::not_found(format!("endpoint '{id}'")))
    }

    /// Deploy a registered model onto an endpoint with the given traffic
    /// share. A share of 100 takes all traffic from the models already
    /// deployed; otherwise the endpoint's total may not exceed 100.
    pub fn deploy_model(
        &self,
        endpoint_id: &str,
        model_id: &str,
        machine_type: &str,
        traffic_percentage: u32,
    ) -> Result<Endpoint> {
        if traffic_percentage > 100 {
            return Err(MlError::deployment(format!(
                "traffic percentage {traffic_percentage} exceeds 100"
            )));
        }
        let model = self.get_model(model_id)?;
        let mut catalog = self.load_endpoints()?;
        let endpoint = catalog
            .endpoints
            .iter_mut()
            .find(|e| e.id == endpoint_id || e.resource_name == endpoint_id)
            .ok_or_else(|| MlError::not_found(format!("endpoint '{endpoint_id}'")))?;

        if traffic_percentage == 100 {
            for existing in &mut endpoint.deployed_models {
                existing.traffic_percentage = 0;
            }
        }
        let allocated: u32 = endpoint
            .deployed_models
            .iter()
            .map(|d| d.traffic_percentage)
            .sum();
        if allocated + traffic_percentage > 100 {
            return Err(MlError::deployment(format!(
                "endpoint already routes {allocated}% of traffic; cannot add {traffic_percentage}%"
            )));
        }

        endpoint.deployed_models.push(DeployedModel {
            id: uuid::Uuid::new_v4().simple().to_string(),
            model_id: model.id.clone(),
            display_name: model.display_name.clone(),
            machine_type: machine_type.to_string(),
            traffic_percentage,
            deployed_at: Utc::now(),
        });
        let updated = endpoint.clone();
        atomic_write_json(&self.endpoints_path(), &catalog)?;
        tracing::info!(
            endpoint = %updated.resource_name,
            model = %model.resource_name,
            machine_type,
            traffic_percentage,
            "Deployed model to endpoint"
        );
        Ok(updated)
    }

    /// Load the model serving most of an endpoint's traffic, verifying the
    /// stored checksum.
    pub fn load_serving_model(&self, endpoint_id: &str) -> Result<ServingModel> {
        let endpoint = self.get_endpoint(endpoint_id)?;
        let deployed = endpoint.primary().cloned().ok_or_else(|| {
            MlError::deployment(format!("endpoint '{endpoint_id}' has no model receiving traffic"))
        })?;
        let model = self.get_model(&deployed.model_id)?;
        let bytes = std::fs::read(&model.model_file)?;
        let digest = sha256_hex(&bytes);
        if digest != model.sha256 {
            return Err(MlError::model(format!(
                "checksum mismatch for {}: expected {}, found {digest}",
                model.model_file.display(),
                model.sha256
            )));
        }
        let file = ModelFile::from_slice(&bytes)?;
        Ok(ServingModel {
            model,
            deployed,
            file,
        })
    }
}
