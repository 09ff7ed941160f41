//! Pipeline DAGs: definition, validation, compilation, and local execution.

pub mod definitions;
pub mod runner;
pub mod types;
pub mod validate;

pub use definitions::{INFERENCE_PIPELINE, TRAINING_PIPELINE, inference_pipeline, training_pipeline};
pub use runner::{LocalRunner, RunResult, RunnerOptions, Services, TaskOutputs, TaskValue};
pub use types::{ComponentKind, InputBinding, InputSpec, PipelineSpec, TaskSpec};
pub use validate::{compile, validate};
