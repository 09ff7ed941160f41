//! # mlplatform-ml: pipeline stages, models, and serving
//!
//! Per-stage logic for the training pipeline (load, preprocess, train,
//! evaluate, deploy) and the batch inference flow, together with the pieces
//! those stages delegate to.

// Foundation
pub mod artifact;
pub mod error;

// Tabular data and features
pub mod data;
pub mod preprocessing;

// Models and search
pub mod algorithms;
pub mod training;

// Registry and hosted endpoints
pub mod serving;

// Stages and pipelines
pub mod components;
pub mod pipeline;

// Re-exports
pub use algorithms::{Algorithm, Estimator};
pub use artifact::{Artifact, ModelFile, ModelMetrics};
pub use data::{Cell, Dataset};
pub use error::{MlError, Result};
pub use pipeline::{LocalRunner, PipelineSpec, Services};
pub use serving::ModelRegistry;
