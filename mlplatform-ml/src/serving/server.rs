//! HTTP surface of a hosted endpoint.
//!
//! Exposes the health and predict routes recorded at registration:
//! `GET /v1/models/<name>` and `POST /v1/models/<name>:predict`.

use crate::algorithms::Estimator;
use crate::data::dataset::{Cell, Dataset};
use crate::serving::registry::ServingModel;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// What a running endpoint serves.
#[derive(Debug, Clone)]
pub struct EndpointState {
    pub model_name: String,
    pub deployed_model_id: String,
    pub estimator: Estimator,
}

pub type SharedEndpoint = Arc<EndpointState>;

impl From<ServingModel> for EndpointState {
    fn from(serving: ServingModel) -> Self {
        Self {
            model_name: serving.model.display_name,
            deployed_model_id: serving.deployed.id,
            estimator: serving.file.estimator,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Cell>,
    pub deployed_model_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServeError::Prediction(msg) => {
                tracing::error!(detail = %msg, "Prediction error");
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        let body = Json(json!({
            "error": true,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Build the endpoint router for the model in `state`.
pub fn router(state: SharedEndpoint) -> Router {
    let health = format!("/v1/models/{}", state.model_name);
    let predict = format!("/v1/models/{}:predict", state.model_name);
    Router::new()
        .route(&health, get(health_handler))
        .route(&predict, post(predict_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<SharedEndpoint>) -> impl IntoResponse {
    Json(json!({
        "name": state.model_name,
        "ready": true,
        "deployed_model_id": state.deployed_model_id,
    }))
}

async fn predict_handler(
    State(state): State<SharedEndpoint>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ServeError> {
    let features = instances_to_dataset(&state.estimator, &request.instances)?;
    let predictions = state
        .estimator
        .predict(&features)
        .map_err(|e| ServeError::Prediction(e.to_string()))?;
    tracing::debug!(rows = predictions.len(), "Served predictions");
    Ok(Json(PredictResponse {
        predictions,
        deployed_model_id: state.deployed_model_id.clone(),
    }))
}

fn value_to_cell(value: Option<&Value>) -> Cell {
    match value {
        None | Some(Value::Null) => Cell::Missing,
        Some(Value::Number(n)) => n.as_f64().map_or(Cell::Missing, Cell::Number),
        Some(Value::String(s)) => Cell::Text(s.clone()),
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Instances are objects keyed by column name, or arrays in the model's
/// input column order.
fn instances_to_dataset(estimator: &Estimator, instances: &[Value]) -> Result<Dataset, ServeError> {
    if instances.is_empty() {
        return Err(ServeError::BadRequest("instances must not be empty".into()));
    }
    let columns: Vec<String> = estimator
        .transformer
        .input_columns()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::with_capacity(instances.len());
    for (i, instance) in instances.iter().enumerate() {
        let row: Vec<Cell> = match instance {
            Value::Object(map) => columns.iter().map(|c| value_to_cell(map.get(c))).collect(),
            Value::Array(values) if values.len() == columns.len() => {
                values.iter().map(|v| value_to_cell(Some(v))).collect()
            }
            Value::Array(values) => {
                return Err(ServeError::BadRequest(format!(
                    "instance {i} has {} values, expected {}",
                    values.len(),
                    columns.len()
                )));
            }
            _ => {
                return Err(ServeError::BadRequest(format!(
                    "instance {i} must be an object or an array"
                )));
            }
        };
        rows.push(row);
    }
    Dataset::new(columns, rows).map_err(|e| ServeError::BadRequest(e.to_string()))
}

/// Serve an endpoint until the process is stopped.
pub async fn serve(state: SharedEndpoint, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, model = %state.model_name, "Endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ModelFile;
    use crate::serving::registry::tests::write_model_artifact;
    use axum::body::Body;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn endpoint() -> SharedEndpoint {
        let dir = TempDir::new().unwrap();
        let artifact = write_model_artifact(dir.path(), "model");
        let file = ModelFile::load(&artifact.model_path()).unwrap();
        Arc::new(EndpointState {
            model_name: "pet-adoption".into(),
            deployed_model_id: "dm-1".into(),
            estimator: file.estimator,
        })
    }

    async fn send(app: Router, req: axum::http::Request<Body>) -> (StatusCode, Value) {
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn predict_request(body: Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/v1/models/pet-adoption:predict")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let req = axum::http::Request::builder()
            .uri("/v1/models/pet-adoption")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(router(endpoint()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "pet-adoption");
        assert_eq!(json["ready"], true);
    }

    #[tokio::test]
    async fn test_predict_objects_and_arrays() {
        let body = json!({
            "instances": [
                {"Age": 1, "Type": "Cat"},
                {"Age": 9, "Type": "Dog"},
            ]
        });
        let (status, json) = send(router(endpoint()), predict_request(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predictions"], json!([1.0, 0.0]));
        assert_eq!(json["deployed_model_id"], "dm-1");

        // Arrays follow the input column order: numeric columns, then categorical.
        let body = json!({"instances": [[9, "Dog"]]});
        let (status, json) = send(router(endpoint()), predict_request(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predictions"], json!([0.0]));
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_instances() {
        let (status, _) = send(router(endpoint()), predict_request(json!({"instances": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(router(endpoint()), predict_request(json!({"instances": [[1]]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            router(endpoint()),
            predict_request(json!({"instances": [{"Age": "old", "Type": "Cat"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], true);
    }

    #[tokio::test]
    async fn test_unknown_model_is_404() {
        let req = axum::http::Request::builder()
            .uri("/v1/models/other")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router(endpoint()), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
