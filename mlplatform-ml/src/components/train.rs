//! Trainer stages: randomized search over a classifier family, persisted as
//! a model artifact.

use crate::algorithms::Algorithm;
use crate::artifact::{Artifact, ModelFile, ModelMetrics};
use crate::data::read_csv;
use crate::error::Result;
use crate::training::search::RandomizedSearchCv;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Search settings shared by both trainers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOptions {
    pub n_iter: usize,
    pub cv: usize,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_iter: 20,
            cv: 5,
            seed: 0,
        }
    }
}

/// Fit `algorithm` on the training artifact and persist the best estimator
/// to `output`.
pub fn train_model(
    algorithm: Algorithm,
    train: &Artifact,
    output: Artifact,
    options: &TrainOptions,
) -> Result<Artifact> {
    let _span = tracing::info_span!("train", algorithm = %algorithm).entered();

    let dataset = read_csv(&train.path())?;
    let (features, labels) = dataset.split_label()?;
    tracing::debug!(rows = features.n_rows(), features = features.n_cols(), "Training");

    let outcome = RandomizedSearchCv::new(algorithm)
        .with_n_iter(options.n_iter)
        .with_cv(options.cv)
        .with_seed(options.seed)
        .fit(&features, &labels)?;
    let training_accuracy = outcome.best_estimator.score(&features, &labels)?;

    tracing::info!(
        best_score = outcome.best_score,
        training_accuracy,
        best_params = %json!(outcome.best_params),
        "Best {} found",
        algorithm.framework()
    );

    let metrics = ModelMetrics {
        best_score: outcome.best_score,
        training_accuracy,
    };
    let file = ModelFile::new(outcome.best_estimator, outcome.best_params.clone(), metrics.clone());
    file.save(&output.model_path())?;
    tracing::info!(path = %output.model_path().display(), "Saved model");

    Ok(output
        .with_metadata("framework", json!(algorithm.framework()))
        .with_metadata("metrics", json!(metrics))
        .with_metadata("best_params", json!(outcome.best_params)))
}

pub fn train_decision_tree(train: &Artifact, output: Artifact) -> Result<Artifact> {
    train_model(Algorithm::DecisionTree, train, output, &TrainOptions::default())
}

pub fn train_random_forest(train: &Artifact, output: Artifact) -> Result<Artifact> {
    train_model(Algorithm::RandomForest, train, output, &TrainOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{Cell, Dataset};
    use crate::data::write_csv;
    use tempfile::TempDir;

    fn train_artifact(dir: &std::path::Path, n: usize) -> Artifact {
        let rows = (0..n)
            .map(|i| {
                let yes = i % 2 == 0;
                vec![
                    Cell::Number(if yes { 1.0 } else { 6.0 } + (i % 4) as f64),
                    Cell::Text(if yes { "Cat" } else { "Dog" }.into()),
                    Cell::Number(if yes { 1.0 } else { 0.0 }),
                ]
            })
            .collect();
        let ds = Dataset::new(vec!["Age".into(), "Type".into(), "Adopted".into()], rows).unwrap();
        let artifact = Artifact::in_dir(dir, "train");
        write_csv(&artifact.path(), &ds).unwrap();
        artifact
    }

    #[test]
    fn test_train_decision_tree_persists_model() {
        let dir = TempDir::new().unwrap();
        let train = train_artifact(dir.path(), 30);
        let model = train_decision_tree(&train, Artifact::in_dir(dir.path(), "model")).unwrap();

        assert_eq!(model.metadata["framework"], "DecisionTree");
        assert_eq!(model.metadata["metrics"]["best_score"], 1.0);
        assert_eq!(model.metadata["best_params"].as_object().unwrap().len(), 4);

        let file = ModelFile::load(&model.model_path()).unwrap();
        assert_eq!(file.algorithm, Algorithm::DecisionTree);
        assert_eq!(file.metrics.training_accuracy, 1.0);
    }

    #[test]
    fn test_train_random_forest_small_search() {
        let dir = TempDir::new().unwrap();
        let train = train_artifact(dir.path(), 20);
        let options = TrainOptions {
            n_iter: 2,
            cv: 2,
            seed: 0,
        };
        let model = train_model(
            Algorithm::RandomForest,
            &train,
            Artifact::in_dir(dir.path(), "model"),
            &options,
        )
        .unwrap();
        assert_eq!(model.metadata["framework"], "RandomForest");
        assert!(model.metadata["best_params"]["n_estimators"].is_u64());
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let dir = TempDir::new().unwrap();
        let train = train_artifact(dir.path(), 3);
        assert!(train_decision_tree(&train, Artifact::in_dir(dir.path(), "model")).is_err());
    }
}
