//! The two shipped pipelines: training and batch inference.

use crate::error::Result;
use crate::pipeline::types::{ComponentKind, InputBinding, PipelineSpec, TaskSpec};
use mlplatform_core::PlatformConfig;
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub const TRAINING_PIPELINE: &str = "pet-adoption-training";
pub const INFERENCE_PIPELINE: &str = "pet-adoption-batch-inference";

fn param(name: &str) -> InputBinding {
    InputBinding::parameter(name)
}

fn base(config: &PlatformConfig, name: &str, description: &str, parameters: BTreeMap<String, Value>) -> PipelineSpec {
    PipelineSpec {
        name: name.to_string(),
        description: description.to_string(),
        pipeline_root: config.pipeline_root.clone(),
        container_image: config.container_image.clone(),
        service_account: Some(config.service_account.clone()),
        parameters,
        tasks: Vec::new(),
    }
}

/// load -> preprocess -> train x2 -> evaluate -> deploy.
///
/// Fails when `SERVING_IMAGE` is not configured.
pub fn training_pipeline(config: &PlatformConfig) -> Result<PipelineSpec> {
    let serving_image = config.require_serving_image()?;
    let parameters = BTreeMap::from([
        ("gcs_url".to_string(), json!(config.gcs_url)),
        ("train_ratio".to_string(), json!(config.train_ratio)),
        ("split_seed".to_string(), json!(config.split_seed)),
        ("project_id".to_string(), json!(config.project_id)),
        ("region".to_string(), json!(config.region)),
        ("serving_image".to_string(), json!(serving_image)),
        ("display_name".to_string(), json!(config.model_display_name)),
        ("machine_type".to_string(), json!(config.machine_type)),
    ]);
    let mut spec = base(
        config,
        TRAINING_PIPELINE,
        "Train decision tree and random forest classifiers, deploy the more accurate one",
        parameters,
    );

    let candidates = |task: TaskSpec| {
        task.with_input(
            "random_forest_model",
            InputBinding::output("train_random_forest", "model"),
        )
        .with_input(
            "decision_tree_model",
            InputBinding::output("train_decision_tree", "model"),
        )
    };

    spec.tasks = vec![
        TaskSpec::new("load_data", ComponentKind::LoadData).with_input("gcs_url", param("gcs_url")),
        TaskSpec::new("preprocess_data", ComponentKind::PreprocessData)
            .with_input("input_dataset", InputBinding::output("load_data", "dataset"))
            .with_input("train_ratio", param("train_ratio"))
            .with_input("seed", param("split_seed")),
        TaskSpec::new("train_decision_tree", ComponentKind::TrainDecisionTree).with_input(
            "train_dataset",
            InputBinding::output("preprocess_data", "train_dataset"),
        ),
        TaskSpec::new("train_random_forest", ComponentKind::TrainRandomForest).with_input(
            "train_dataset",
            InputBinding::output("preprocess_data", "train_dataset"),
        ),
        candidates(TaskSpec::new("evaluate_model", ComponentKind::EvaluateModel).with_input(
            "test_dataset",
            InputBinding::output("preprocess_data", "test_dataset"),
        )),
        candidates(
            TaskSpec::new("deploy_model", ComponentKind::DeployModel)
                .with_input(
                    "optimal_model",
                    InputBinding::output("evaluate_model", "optimal_model"),
                )
                .with_input("serving_image", param("serving_image"))
                .with_input("project", param("project_id"))
                .with_input("region", param("region"))
                .with_input("display_name", param("display_name"))
                .with_input("machine_type", param("machine_type")),
        ),
    ];
    Ok(spec)
}

/// A single batch prediction task over the configured model and input data.
pub fn inference_pipeline(config: &PlatformConfig) -> PipelineSpec {
    let parameters = BTreeMap::from([
        ("model_gcs_path".to_string(), json!(config.model_gcs_path)),
        ("input_data_gcs_path".to_string(), json!(config.input_data_gcs_path())),
        ("table_ref".to_string(), json!(config.table_ref)),
        ("project_id".to_string(), json!(config.project_id)),
        ("sample_size".to_string(), json!(config.batch_sample_size)),
    ]);
    let mut spec = base(
        config,
        INFERENCE_PIPELINE,
        "Score a sample of the input data and append predictions to the warehouse",
        parameters,
    );
    spec.tasks = vec![
        TaskSpec::new("batch_predict", ComponentKind::BatchPredict)
            .with_input("model_gcs_path", param("model_gcs_path"))
            .with_input("input_data_gcs_path", param("input_data_gcs_path"))
            .with_input("table_ref", param("table_ref"))
            .with_input("project", param("project_id"))
            .with_input("sample_size", param("sample_size")),
    ];
    spec
}
