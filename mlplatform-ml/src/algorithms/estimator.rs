//! A fitted preprocessing + classifier pair.

use crate::algorithms::{Algorithm, Classifier};
use crate::data::dataset::{Cell, Dataset};
use crate::error::{MlError, Result};
use crate::preprocessing::ColumnTransformer;
use crate::training::metrics::accuracy_score;
use crate::training::search::Params;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The object persisted in a model artifact and served by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    pub transformer: ColumnTransformer,
    /// Class labels in sorted order; classifier outputs index into this.
    pub classes: Vec<Cell>,
    pub classifier: Classifier,
}

impl Estimator {
    /// Fit preprocessing and a classifier built from `params` on the given
    /// features and labels.
    pub fn fit(
        algorithm: Algorithm,
        params: &Params,
        seed: u64,
        features: &Dataset,
        labels: &[Cell],
    ) -> Result<Self> {
        if features.n_rows() != labels.len() {
            return Err(MlError::training(format!(
                "{} feature rows but {} labels",
                features.n_rows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(MlError::training("training set is empty"));
        }

        let mut classes: Vec<Cell> = Vec::new();
        let mut seen = HashSet::new();
        for label in labels {
            if seen.insert(label.key()) {
                classes.push(label.clone());
            }
        }
        classes.sort_by(Cell::total_cmp);
        let class_index: HashMap<String, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key(), i))
            .collect();
        let y: Vec<usize> = labels.iter().map(|l| class_index[&l.key()]).collect();

        let transformer = ColumnTransformer::fit(features)?;
        let x = transformer.transform(features)?;
        let mut classifier = algorithm.build(params, seed)?;
        classifier.fit(&x, &y, classes.len())?;

        Ok(Self {
            transformer,
            classes,
            classifier,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.classifier.algorithm()
    }

    /// Predicted class label for each row of `features`.
    pub fn predict(&self, features: &Dataset) -> Result<Vec<Cell>> {
        let x = self.transformer.transform(features)?;
        let predicted = self.classifier.predict(&x)?;
        predicted
            .into_iter()
            .map(|i| {
                self.classes
                    .get(i)
                    .cloned()
                    .ok_or_else(|| MlError::model(format!("class index {i} out of range")))
            })
            .collect()
    }

    /// Mean accuracy of `predict(features)` against `labels`.
    pub fn score(&self, features: &Dataset, labels: &[Cell]) -> Result<f64> {
        let predicted = self.predict(features)?;
        accuracy_score(labels, &predicted)
    }
}
