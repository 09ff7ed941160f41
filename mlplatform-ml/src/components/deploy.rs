//! Deployer stage: register the winning model and serve it from a new
//! endpoint.

use crate::components::evaluate::ModelCandidate;
use crate::error::{MlError, Result};
use crate::serving::registry::{ModelRegistry, ModelUpload};

/// Share of endpoint traffic routed to a freshly deployed model.
pub const FULL_TRAFFIC: u32 = 100;

#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub optimal_model: &'a str,
    pub candidates: &'a [ModelCandidate],
    pub serving_image: &'a str,
    pub project: &'a str,
    pub region: &'a str,
    pub display_name: &'a str,
    pub machine_type: &'a str,
}

/// Register the chosen candidate, create an endpoint, and route all traffic
/// to it. Returns the endpoint's resource name.
///
/// A failure after registration leaves the registered model in place.
pub fn deploy_model(registry: &ModelRegistry, request: &DeployRequest<'_>) -> Result<String> {
    let candidate = request
        .candidates
        .iter()
        .find(|c| c.id == request.optimal_model)
        .ok_or_else(|| MlError::UnknownCandidate {
            name: request.optimal_model.to_string(),
            known: request
                .candidates
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let model = registry.upload_model(ModelUpload {
        display_name: request.display_name,
        artifact: &candidate.artifact,
        serving_image: request.serving_image,
        project: request.project,
        region: request.region,
    })?;
    let endpoint = registry.create_endpoint(request.display_name, request.project, request.region)?;
    let endpoint =
        registry.deploy_model(&endpoint.id, &model.id, request.machine_type, FULL_TRAFFIC)?;

    tracing::info!(
        model = %model.resource_name,
        endpoint = %endpoint.resource_name,
        candidate = %candidate.id,
        "Model deployed"
    );
    Ok(endpoint.resource_name)
}
