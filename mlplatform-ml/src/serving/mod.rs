//! Model registry, endpoints, and the HTTP prediction server.

pub mod registry;
pub mod server;

pub use registry::{DeployedModel, Endpoint, ModelRegistry, ModelUpload, RegisteredModel, ServingModel};
pub use server::{EndpointState, SharedEndpoint, router, serve};
