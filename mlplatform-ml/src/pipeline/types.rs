//! Pipeline DAG definitions.
//!
//! A pipeline is a list of tasks. Each task runs one component and binds the
//! component's inputs to pipeline parameters, constants, or outputs of
//! upstream tasks. The task graph is implied by the `task_output` bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A complete pipeline definition, as compiled for an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Root under which runs write their artifacts.
    pub pipeline_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub tasks: Vec<TaskSpec>,
}

impl PipelineSpec {
    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub component: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputBinding>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, component: ComponentKind) -> Self {
        Self {
            id: id.into(),
            component: component.name().to_string(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, binding: InputBinding) -> Self {
        self.inputs.insert(name.into(), binding);
        self
    }

    /// Ids of the tasks this one consumes outputs from.
    pub fn upstream(&self) -> impl Iterator<Item = &str> + '_ {
        self.inputs.values().filter_map(|b| match b {
            InputBinding::TaskOutput { task, .. } => Some(task.as_str()),
            _ => None,
        })
    }
}

/// Where a task input's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputBinding {
    Parameter { name: String },
    Constant { value: Value },
    TaskOutput { task: String, output: String },
}

impl InputBinding {
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter { name: name.into() }
    }

    pub fn constant(value: Value) -> Self {
        Self::Constant { value }
    }

    pub fn output(task: impl Into<String>, output: impl Into<String>) -> Self {
        Self::TaskOutput {
            task: task.into(),
            output: output.into(),
        }
    }
}

/// A declared component input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> InputSpec {
    InputSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> InputSpec {
    InputSpec {
        name,
        required: false,
    }
}

const LOAD_INPUTS: &[InputSpec] = &[required("gcs_url")];

const PREPROCESS_INPUTS: &[InputSpec] = &[
    required("input_dataset"),
    required("train_ratio"),
    optional("seed"),
];

const TRAIN_INPUTS: &[InputSpec] = &[
    required("train_dataset"),
    optional("n_iter"),
    optional("cv"),
    optional("seed"),
];

const EVALUATE_INPUTS: &[InputSpec] = &[
    required("test_dataset"),
    optional("random_forest_model"),
    optional("decision_tree_model"),
    optional("tie_break"),
];

const DEPLOY_INPUTS: &[InputSpec] = &[
    required("optimal_model"),
    optional("random_forest_model"),
    optional("decision_tree_model"),
    required("serving_image"),
    required("project"),
    required("region"),
    optional("display_name"),
    optional("machine_type"),
];

const BATCH_PREDICT_INPUTS: &[InputSpec] = &[
    required("model_gcs_path"),
    required("input_data_gcs_path"),
    required("table_ref"),
    required("project"),
    optional("target_column"),
    optional("sample_size"),
    optional("seed"),
];

/// Model inputs of the evaluator and deployer, in comparison order.
pub const CANDIDATE_INPUTS: [&str; 2] = ["random_forest_model", "decision_tree_model"];

/// The components a task can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    LoadData,
    PreprocessData,
    TrainDecisionTree,
    TrainRandomForest,
    EvaluateModel,
    DeployModel,
    BatchPredict,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::LoadData,
        ComponentKind::PreprocessData,
        ComponentKind::TrainDecisionTree,
        ComponentKind::TrainRandomForest,
        ComponentKind::EvaluateModel,
        ComponentKind::DeployModel,
        ComponentKind::BatchPredict,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::LoadData => "load_data",
            ComponentKind::PreprocessData => "preprocess_data",
            ComponentKind::TrainDecisionTree => "train_decision_tree",
            ComponentKind::TrainRandomForest => "train_random_forest",
            ComponentKind::EvaluateModel => "evaluate_model",
            ComponentKind::DeployModel => "deploy_model",
            ComponentKind::BatchPredict => "batch_predict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn inputs(self) -> &'static [InputSpec] {
        match self {
            ComponentKind::LoadData => LOAD_INPUTS,
            ComponentKind::PreprocessData => PREPROCESS_INPUTS,
            ComponentKind::TrainDecisionTree | ComponentKind::TrainRandomForest => TRAIN_INPUTS,
            ComponentKind::EvaluateModel => EVALUATE_INPUTS,
            ComponentKind::DeployModel => DEPLOY_INPUTS,
            ComponentKind::BatchPredict => BATCH_PREDICT_INPUTS,
        }
    }

    pub fn outputs(self) -> &'static [&'static str] {
        match self {
            ComponentKind::LoadData => &["dataset"],
            ComponentKind::PreprocessData => &["train_dataset", "test_dataset"],
            ComponentKind::TrainDecisionTree | ComponentKind::TrainRandomForest => &["model"],
            ComponentKind::EvaluateModel => &["optimal_model", "results"],
            ComponentKind::DeployModel => &["endpoint"],
            ComponentKind::BatchPredict => &["message"],
        }
    }

    pub fn input(self, name: &str) -> Option<InputSpec> {
        self.inputs().iter().copied().find(|i| i.name == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
