//! Classifier families available to the trainers.
//!
//! An [`Algorithm`] names a family, owns its hyperparameter grid, and builds
//! an unfitted [`Classifier`] from one point of that grid.

pub mod estimator;
pub mod forest;
pub mod tree;

pub use estimator::Estimator;
pub use forest::RandomForestClassifier;
pub use tree::{DecisionTreeClassifier, MaxFeatures, TreeParams};

use crate::error::{MlError, Result};
use crate::training::search::{ParamGrid, Params};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DecisionTree,
    RandomForest,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::DecisionTree, Algorithm::RandomForest];

    /// Framework tag recorded in model metadata.
    pub fn framework(self) -> &'static str {
        match self {
            Algorithm::DecisionTree => "DecisionTree",
            Algorithm::RandomForest => "RandomForest",
        }
    }

    /// Candidate identifier used by the evaluator and deployer.
    pub fn id(self) -> &'static str {
        match self {
            Algorithm::DecisionTree => "decision_tree",
            Algorithm::RandomForest => "random_forest",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Search space explored by the trainer.
    pub fn param_grid(self) -> ParamGrid {
        let depth = vec![Value::Null, json!(10), json!(20), json!(30)];
        let split = vec![json!(2), json!(5), json!(10)];
        let leaf = vec![json!(1), json!(2), json!(4)];
        match self {
            Algorithm::DecisionTree => ParamGrid::new()
                .with("max_depth", depth)
                .with("min_samples_split", split)
                .with("min_samples_leaf", leaf)
                .with(
                    "max_features",
                    vec![Value::Null, json!("auto"), json!("sqrt"), json!("log2")],
                ),
            Algorithm::RandomForest => ParamGrid::new()
                .with(
                    "n_estimators",
                    vec![json!(10), json!(50), json!(100), json!(200)],
                )
                .with("max_depth", depth)
                .with("min_samples_split", split)
                .with("min_samples_leaf", leaf),
        }
    }

    /// Build an unfitted classifier for one grid point. Unset parameters keep
    /// their defaults; unknown parameters are rejected.
    pub fn build(self, params: &Params, seed: u64) -> Result<Classifier> {
        let mut tree = TreeParams::default();
        let mut n_estimators = 100;
        let mut max_features = None;

        for (name, value) in params {
            match name.as_str() {
                "max_depth" => tree.max_depth = optional_usize(name, value)?,
                "min_samples_split" => tree.min_samples_split = positive_usize(name, value, 2)?,
                "min_samples_leaf" => tree.min_samples_leaf = positive_usize(name, value, 1)?,
                "max_features" => max_features = Some(parse_max_features(value)?),
                "n_estimators" if self == Algorithm::RandomForest => {
                    n_estimators = positive_usize(name, value, 1)?
                }
                other => {
                    return Err(MlError::invalid_input(format!(
                        "unknown hyperparameter '{other}' for {}",
                        self.framework()
                    )));
                }
            }
        }

        Ok(match self {
            Algorithm::DecisionTree => {
                tree.max_features = max_features.unwrap_or(MaxFeatures::All);
                Classifier::DecisionTree(DecisionTreeClassifier::new(tree, seed))
            }
            Algorithm::RandomForest => {
                tree.max_features = max_features.unwrap_or(MaxFeatures::Sqrt);
                let mut forest = RandomForestClassifier::new(n_estimators, seed);
                forest.tree_params = tree;
                Classifier::RandomForest(forest)
            }
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

fn optional_usize(name: &str, value: &Value) -> Result<Option<usize>> {
    if value.is_null() {
        return Ok(None);
    }
    positive_usize(name, value, 1).map(Some)
}

fn positive_usize(name: &str, value: &Value, min: usize) -> Result<usize> {
    value
        .as_u64()
        .map(|v| v as usize)
        .filter(|v| *v >= min)
        .ok_or_else(|| {
            MlError::invalid_input(format!(
                "hyperparameter '{name}' must be an integer >= {min}, got {value}"
            ))
        })
}

fn parse_max_features(value: &Value) -> Result<MaxFeatures> {
    match value {
        Value::Null => Ok(MaxFeatures::All),
        Value::String(s) if s == "auto" || s == "sqrt" => Ok(MaxFeatures::Sqrt),
        Value::String(s) if s == "log2" => Ok(MaxFeatures::Log2),
        other => Err(MlError::invalid_input(format!(
            "max_features must be null, \"auto\", \"sqrt\" or \"log2\", got {other}"
        ))),
    }
}

/// A fitted or unfitted classifier of either family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    DecisionTree(DecisionTreeClassifier),
    RandomForest(RandomForestClassifier),
}

impl Classifier {
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        match self {
            Classifier::DecisionTree(m) => m.fit(x, y, n_classes),
            Classifier::RandomForest(m) => m.fit(x, y, n_classes),
        }
    }

    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        match self {
            Classifier::DecisionTree(m) => m.predict_proba(x),
            Classifier::RandomForest(m) => m.predict_proba(x),
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>> {
        Ok(self.predict_proba(x)?.iter().map(|p| tree::argmax(p)).collect())
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Classifier::DecisionTree(_) => Algorithm::DecisionTree,
            Classifier::RandomForest(_) => Algorithm::RandomForest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(Algorithm::DecisionTree.param_grid().len(), 144);
        assert_eq!(Algorithm::RandomForest.param_grid().len(), 144);
    }

    #[test]
    fn test_build_decision_tree() {
        let p = params(&[
            ("max_depth", json!(10)),
            ("min_samples_split", json!(5)),
            ("min_samples_leaf", json!(2)),
            ("max_features", json!("auto")),
        ]);
        let Classifier::DecisionTree(tree) = Algorithm::DecisionTree.build(&p, 0).unwrap() else {
            panic!("expected a decision tree");
        };
        assert_eq!(tree.params.max_depth, Some(10));
        assert_eq!(tree.params.min_samples_split, 5);
        assert_eq!(tree.params.min_samples_leaf, 2);
        assert_eq!(tree.params.max_features, MaxFeatures::Sqrt);
    }

    #[test]
    fn test_build_random_forest() {
        let p = params(&[("n_estimators", json!(50)), ("max_depth", Value::Null)]);
        let Classifier::RandomForest(forest) = Algorithm::RandomForest.build(&p, 0).unwrap() else {
            panic!("expected a random forest");
        };
        assert_eq!(forest.n_estimators, 50);
        assert_eq!(forest.tree_params.max_depth, None);
        assert_eq!(forest.tree_params.max_features, MaxFeatures::Sqrt);
    }

    #[test]
    fn test_build_rejects_bad_params() {
        let tree_with_estimators = params(&[("n_estimators", json!(10))]);
        assert!(Algorithm::DecisionTree.build(&tree_with_estimators, 0).is_err());
        let bad_split = params(&[("min_samples_split", json!(1))]);
        assert!(Algorithm::DecisionTree.build(&bad_split, 0).is_err());
        let bad_features = params(&[("max_features", json!(0.5))]);
        assert!(Algorithm::DecisionTree.build(&bad_features, 0).is_err());
    }

    #[test]
    fn test_ids_round_trip() {
        for a in Algorithm::ALL {
            assert_eq!(Algorithm::from_id(a.id()), Some(a));
        }
        assert_eq!(Algorithm::from_id("svm"), None);
    }
}
