//! Sequential local execution of a pipeline definition.
//!
//! Tasks run one at a time in topological order. Each task writes its
//! artifacts under `<artifact_root>/<run_id>/<task_id>/`.

use crate::algorithms::Algorithm;
use crate::artifact::Artifact;
use crate::components::{
    BatchPredictRequest, DeployRequest, ModelCandidate, PreprocessOptions, TieBreak, TrainOptions,
    batch_predict, deploy_model, evaluate_model, load_data, preprocess_data, train_model,
};
use crate::data::BinaryLabelMapping;
use crate::error::{MlError, Result};
use crate::pipeline::types::{CANDIDATE_INPUTS, ComponentKind, InputBinding, PipelineSpec, TaskSpec};
use crate::pipeline::validate::validate;
use crate::serving::ModelRegistry;
use mlplatform_core::{FsObjectStore, ObjectStore, PlatformConfig, SqliteWarehouse, Warehouse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The managed services a run talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn ObjectStore>,
    pub warehouse: Arc<dyn Warehouse>,
    pub registry: ModelRegistry,
}

impl Services {
    /// Local backends rooted at the configured directories.
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            store: Arc::new(FsObjectStore::new(&config.storage_root)),
            warehouse: Arc::new(SqliteWarehouse::new(&config.warehouse_path)),
            registry: ModelRegistry::new(&config.registry_dir),
        }
    }
}

/// Defaults applied where a task leaves an optional input unbound.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub train: TrainOptions,
    pub tie_break: TieBreak,
    pub label_mapping: BinaryLabelMapping,
}

/// A value produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    Artifact(Artifact),
    Value(Value),
}

pub type TaskOutputs = BTreeMap<String, TaskValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub outputs: BTreeMap<String, TaskOutputs>,
}

impl RunResult {
    pub fn output(&self, task: &str, name: &str) -> Option<&TaskValue> {
        self.outputs.get(task)?.get(name)
    }

    pub fn artifact(&self, task: &str, name: &str) -> Option<&Artifact> {
        match self.output(task, name)? {
            TaskValue::Artifact(a) => Some(a),
            TaskValue::Value(_) => None,
        }
    }
}

pub struct LocalRunner {
    services: Services,
    artifact_root: PathBuf,
    options: RunnerOptions,
}

impl LocalRunner {
    pub fn new(services: Services, artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            services,
            artifact_root: artifact_root.into(),
            options: RunnerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate and execute `spec`. The first failing task aborts the run;
    /// artifacts written so far stay in place.
    pub async fn run(&self, spec: &PipelineSpec) -> Result<RunResult> {
        let order = validate(spec)?;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let run_id = format!("{}-{}", spec.name, &suffix[..8]);
        let run_dir = self.artifact_root.join(&run_id);
        tracing::info!(pipeline = %spec.name, run_id = %run_id, tasks = order.len(), "Starting run");

        let mut outputs: BTreeMap<String, TaskOutputs> = BTreeMap::new();
        for idx in order {
            let task = &spec.tasks[idx];
            let inputs = Inputs::resolve(spec, task, &outputs)?;
            let task_dir = run_dir.join(&task.id);
            std::fs::create_dir_all(&task_dir)?;

            let kind = ComponentKind::from_name(&task.component)
                .ok_or_else(|| MlError::pipeline(format!("unknown component '{}'", task.component)))?;
            tracing::info!(task = %task.id, component = %kind, "Running task");
            let produced = self.execute(kind, &inputs, &task_dir).await?;
            outputs.insert(task.id.clone(), produced);
        }

        tracing::info!(run_id = %run_id, "Run completed");
        Ok(RunResult {
            run_id,
            run_dir,
            outputs,
        })
    }

    async fn execute(&self, kind: ComponentKind, inputs: &Inputs<'_>, dir: &Path) -> Result<TaskOutputs> {
        let mut out = TaskOutputs::new();
        match kind {
            ComponentKind::LoadData => {
                let url = inputs.string("gcs_url")?;
                let dataset =
                    load_data(self.services.store.as_ref(), &url, Artifact::in_dir(dir, "dataset")).await?;
                out.insert("dataset".into(), TaskValue::Artifact(dataset));
            }
            ComponentKind::PreprocessData => {
                let mut options = PreprocessOptions::new(inputs.f64("train_ratio")?);
                options.label_mapping = self.options.label_mapping.clone();
                if let Some(seed) = inputs.opt_u64("seed")? {
                    options = options.with_seed(seed);
                }
                let split = preprocess_data(
                    inputs.artifact("input_dataset")?,
                    &options,
                    Artifact::in_dir(dir, "train_dataset"),
                    Artifact::in_dir(dir, "test_dataset"),
                )?;
                out.insert("train_dataset".into(), TaskValue::Artifact(split.train));
                out.insert("test_dataset".into(), TaskValue::Artifact(split.test));
            }
            ComponentKind::TrainDecisionTree | ComponentKind::TrainRandomForest => {
                let algorithm = if kind == ComponentKind::TrainDecisionTree {
                    Algorithm::DecisionTree
                } else {
                    Algorithm::RandomForest
                };
                let mut options = self.options.train;
                if let Some(n_iter) = inputs.opt_u64("n_iter")? {
                    options.n_iter = n_iter as usize;
                }
                if let Some(cv) = inputs.opt_u64("cv")? {
                    options.cv = cv as usize;
                }
                if let Some(seed) = inputs.opt_u64("seed")? {
                    options.seed = seed;
                }
                let model = train_model(
                    algorithm,
                    inputs.artifact("train_dataset")?,
                    Artifact::in_dir(dir, "model"),
                    &options,
                )?;
                out.insert("model".into(), TaskValue::Artifact(model));
            }
            ComponentKind::EvaluateModel => {
                let tie_break = match inputs.opt_string("tie_break")? {
                    Some(policy) => serde_json::from_value(Value::String(policy))
                        .map_err(|e| MlError::pipeline(format!("invalid tie_break: {e}")))?,
                    None => self.options.tie_break,
                };
                let evaluation =
                    evaluate_model(&inputs.candidates()?, inputs.artifact("test_dataset")?, tie_break)?;
                out.insert(
                    "optimal_model".into(),
                    TaskValue::Value(json!(evaluation.optimal_model)),
                );
                out.insert("results".into(), TaskValue::Value(json!(evaluation.results)));
            }
            ComponentKind::DeployModel => {
                let candidates = inputs.candidates()?;
                let optimal = inputs.string("optimal_model")?;
                let serving_image = inputs.string("serving_image")?;
                let project = inputs.string("project")?;
                let region = inputs.string("region")?;
                let display_name = inputs
                    .opt_string("display_name")?
                    .unwrap_or_else(|| "pet-adoption".to_string());
                let machine_type = inputs
                    .opt_string("machine_type")?
                    .unwrap_or_else(|| "n1-standard-4".to_string());
                let endpoint = deploy_model(
                    &self.services.registry,
                    &DeployRequest {
                        optimal_model: &optimal,
                        candidates: &candidates,
                        serving_image: &serving_image,
                        project: &project,
                        region: &region,
                        display_name: &display_name,
                        machine_type: &machine_type,
                    },
                )?;
                out.insert("endpoint".into(), TaskValue::Value(json!(endpoint)));
            }
            ComponentKind::BatchPredict => {
                let mut request = BatchPredictRequest::new(
                    inputs.string("model_gcs_path")?,
                    inputs.string("input_data_gcs_path")?,
                    inputs.string("table_ref")?,
                    inputs.string("project")?,
                );
                request.target_column = inputs.opt_string("target_column")?;
                if let Some(n) = inputs.opt_u64("sample_size")? {
                    request.sample_size = n as usize;
                }
                request.seed = inputs.opt_u64("seed")?;
                let message = batch_predict(
                    self.services.store.as_ref(),
                    self.services.warehouse.as_ref(),
                    &request,
                )
                .await?;
                out.insert("message".into(), TaskValue::Value(json!(message)));
            }
        }
        Ok(out)
    }
}

/// A task's inputs resolved against parameters and upstream outputs.
struct Inputs<'a> {
    task: &'a str,
    values: BTreeMap<&'a str, TaskValue>,
}

impl<'a> Inputs<'a> {
    fn resolve(
        spec: &'a PipelineSpec,
        task: &'a TaskSpec,
        outputs: &BTreeMap<String, TaskOutputs>,
    ) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (name, binding) in &task.inputs {
            let value = match binding {
                InputBinding::Parameter { name: param } => {
                    let v = spec.parameters.get(param).ok_or_else(|| {
                        MlError::pipeline(format!("unknown parameter '{param}'"))
                    })?;
                    TaskValue::Value(v.clone())
                }
                InputBinding::Constant { value } => TaskValue::Value(value.clone()),
                InputBinding::TaskOutput {
                    task: upstream,
                    output,
                } => outputs
                    .get(upstream)
                    .and_then(|o| o.get(output))
                    .cloned()
                    .ok_or_else(|| {
                        MlError::pipeline(format!(
                            "task '{}' needs output '{output}' of '{upstream}', which was not produced",
                            task.id
                        ))
                    })?,
            };
            values.insert(name.as_str(), value);
        }
        Ok(Self {
            task: &task.id,
            values,
        })
    }

    fn invalid(&self, name: &str, expected: &str) -> MlError {
        MlError::pipeline(format!(
            "input '{name}' of task '{}' must be {expected}",
            self.task
        ))
    }

    fn value(&self, name: &str) -> Result<Option<&Value>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(TaskValue::Value(Value::Null)) => Ok(None),
            Some(TaskValue::Value(v)) => Ok(Some(v)),
            Some(TaskValue::Artifact(_)) => Err(self.invalid(name, "a value, not an artifact")),
        }
    }

    fn artifact(&self, name: &str) -> Result<&Artifact> {
        match self.values.get(name) {
            Some(TaskValue::Artifact(a)) => Ok(a),
            _ => Err(self.invalid(name, "an artifact")),
        }
    }

    fn opt_string(&self, name: &str) -> Result<Option<String>> {
        match self.value(name)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(self.invalid(name, "a string")),
        }
    }

    fn string(&self, name: &str) -> Result<String> {
        self.opt_string(name)?
            .ok_or_else(|| self.invalid(name, "set"))
    }

    fn f64(&self, name: &str) -> Result<f64> {
        let parsed = match self.value(name)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(name, "a number"))
    }

    fn opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.value(name)? {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a non-negative integer")),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(name, "a non-negative integer")),
            Some(_) => Err(self.invalid(name, "a non-negative integer")),
        }
    }

    /// Bound model inputs, in comparison order.
    fn candidates(&self) -> Result<Vec<ModelCandidate>> {
        let mut candidates = Vec::new();
        for input in CANDIDATE_INPUTS {
            if self.values.contains_key(input) {
                let id = input.trim_end_matches("_model");
                candidates.push(ModelCandidate::new(id, self.artifact(input)?.clone()));
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlplatform_core::StorageLocator;
    use tempfile::TempDir;

    fn services(dir: &Path) -> Services {
        Services {
            store: Arc::new(FsObjectStore::new(dir.join("buckets"))),
            warehouse: Arc::new(SqliteWarehouse::new(dir.join("warehouse.db"))),
            registry: ModelRegistry::new(dir.join("registry")),
        }
    }

    fn spec(tasks: Vec<TaskSpec>) -> PipelineSpec {
        PipelineSpec {
            name: "local".into(),
            description: String::new(),
            pipeline_root: "unused".into(),
            container_image: None,
            service_account: None,
            parameters: BTreeMap::from([
                ("gcs_url".to_string(), json!("gs://pets/raw/adoption.csv")),
                ("train_ratio".to_string(), json!("0.75")),
            ]),
            tasks,
        }
    }

    async fn seed(store: &dyn ObjectStore) {
        let mut csv = String::from("Age,Type,Adopted\n");
        for i in 0..20 {
            let (age, kind, label) = if i % 2 == 0 {
                (1 + i % 3, "Cat", "Yes")
            } else {
                (8 + i % 3, "Dog", "No")
            };
            csv.push_str(&format!("{age},{kind},{label}\n"));
        }
        store
            .put(&StorageLocator::parse("gs://pets/raw/adoption.csv").unwrap(), csv.as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_runs_load_and_preprocess() {
        let dir = TempDir::new().unwrap();
        let services = services(dir.path());
        seed(services.store.as_ref()).await;

        let s = spec(vec![
            TaskSpec::new("pre", ComponentKind::PreprocessData)
                .with_input("input_dataset", InputBinding::output("load", "dataset"))
                .with_input("train_ratio", InputBinding::parameter("train_ratio"))
                .with_input("seed", InputBinding::constant(json!(7))),
            TaskSpec::new("load", ComponentKind::LoadData)
                .with_input("gcs_url", InputBinding::parameter("gcs_url")),
        ]);
        let result = LocalRunner::new(services, dir.path().join("runs")).run(&s).await.unwrap();

        assert!(result.run_id.starts_with("local-"));
        let train = result.artifact("pre", "train_dataset").unwrap();
        assert!(train.path().starts_with(result.run_dir.join("pre")));
        assert_eq!(crate::data::read_csv(&train.path()).unwrap().n_rows(), 15);
        assert!(result.artifact("load", "dataset").unwrap().path().exists());
    }

    fn tied_candidates(tie_break: Option<&str>) -> PipelineSpec {
        let mut evaluate = TaskSpec::new("evaluate", ComponentKind::EvaluateModel)
            .with_input("test_dataset", InputBinding::output("pre", "test_dataset"))
            .with_input("decision_tree_model", InputBinding::output("train", "model"))
            .with_input("random_forest_model", InputBinding::output("train", "model"));
        if let Some(policy) = tie_break {
            evaluate = evaluate.with_input("tie_break", InputBinding::constant(json!(policy)));
        }
        spec(vec![
            TaskSpec::new("load", ComponentKind::LoadData)
                .with_input("gcs_url", InputBinding::parameter("gcs_url")),
            TaskSpec::new("pre", ComponentKind::PreprocessData)
                .with_input("input_dataset", InputBinding::output("load", "dataset"))
                .with_input("train_ratio", InputBinding::parameter("train_ratio")),
            TaskSpec::new("train", ComponentKind::TrainDecisionTree)
                .with_input("train_dataset", InputBinding::output("pre", "train_dataset"))
                .with_input("n_iter", InputBinding::constant(json!(2)))
                .with_input("cv", InputBinding::constant(json!(2))),
            evaluate,
        ])
    }

    #[tokio::test]
    async fn test_tied_candidates_favour_random_forest() {
        let dir = TempDir::new().unwrap();
        let services = services(dir.path());
        seed(services.store.as_ref()).await;
        let runner = LocalRunner::new(services, dir.path().join("runs"));

        let result = runner.run(&tied_candidates(None)).await.unwrap();
        assert_eq!(
            result.output("evaluate", "optimal_model"),
            Some(&TaskValue::Value(json!("random_forest")))
        );
        let Some(TaskValue::Value(results)) = result.output("evaluate", "results") else {
            panic!("missing evaluation results");
        };
        let compared: Vec<&str> = results
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["model"].as_str().unwrap())
            .collect();
        assert_eq!(compared, vec!["random_forest", "decision_tree"]);

        let result = runner.run(&tied_candidates(Some("last"))).await.unwrap();
        assert_eq!(
            result.output("evaluate", "optimal_model"),
            Some(&TaskValue::Value(json!("decision_tree")))
        );
    }

    #[tokio::test]
    async fn test_artifact_input_must_be_artifact() {
        let dir = TempDir::new().unwrap();
        let s = spec(vec![
            TaskSpec::new("pre", ComponentKind::PreprocessData)
                .with_input("input_dataset", InputBinding::parameter("gcs_url"))
                .with_input("train_ratio", InputBinding::parameter("train_ratio")),
        ]);
        let err = LocalRunner::new(services(dir.path()), dir.path().join("runs"))
            .run(&s)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be an artifact"), "{err}");
    }

    #[tokio::test]
    async fn test_failed_task_aborts_run() {
        let dir = TempDir::new().unwrap();
        // Nothing seeded: the load task fails.
        let s = spec(vec![
            TaskSpec::new("load", ComponentKind::LoadData)
                .with_input("gcs_url", InputBinding::parameter("gcs_url")),
        ]);
        let err = LocalRunner::new(services(dir.path()), dir.path().join("runs"))
            .run(&s)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gs://pets/raw/adoption.csv"));
    }
}
