//! Randomized hyperparameter search over a discrete grid, scored by
//! stratified k-fold cross-validation.

use crate::algorithms::{Algorithm, Estimator};
use crate::data::dataset::{Cell, Dataset};
use crate::error::{MlError, Result};
use crate::training::cv::StratifiedKFold;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point of a grid: parameter name to chosen value.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Named discrete choices. Points are enumerated in mixed radix over the
/// parameter names in sorted order, the last name varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub params: BTreeMap<String, Vec<serde_json::Value>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    /// Number of points in the grid.
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th grid point.
    pub fn point(&self, index: usize) -> Option<Params> {
        if index >= self.len() {
            return None;
        }
        let mut rest = index;
        let mut point = Params::new();
        for (name, values) in self.params.iter().rev() {
            point.insert(name.clone(), values[rest % values.len()].clone());
            rest /= values.len();
        }
        Some(point)
    }
}

/// Cross-validated score of one sampled grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: Params,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Result of a search: the refit best estimator and every candidate's score.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: Params,
    pub best_score: f64,
    pub best_estimator: Estimator,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct RandomizedSearchCv {
    pub algorithm: Algorithm,
    pub grid: ParamGrid,
    pub n_iter: usize,
    pub cv: usize,
    /// Seed for sampling grid points.
    pub search_seed: u64,
    /// Seed passed to every classifier.
    pub model_seed: u64,
}

impl RandomizedSearchCv {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            grid: algorithm.param_grid(),
            n_iter: 20,
            cv: 5,
            search_seed: 0,
            model_seed: 0,
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.search_seed = seed;
        self.model_seed = seed;
        self
    }

    /// Grid points to evaluate, in evaluation order.
    pub fn sample_points(&self) -> Vec<Params> {
        let total = self.grid.len();
        let indices = if self.n_iter >= total {
            (0..total).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(self.search_seed);
            rand::seq::index::sample(&mut rng, total, self.n_iter).into_vec()
        };
        indices
            .into_iter()
            .filter_map(|i| self.grid.point(i))
            .collect()
    }

    /// Score sampled points by cross-validation and refit the best one on
    /// all of `features`.
    pub fn fit(&self, features: &Dataset, labels: &[Cell]) -> Result<SearchOutcome> {
        if self.grid.is_empty() || self.n_iter == 0 {
            return Err(MlError::training("search space is empty"));
        }
        let folds = StratifiedKFold::new(self.cv).split(labels)?;

        let mut candidates = Vec::new();
        for params in self.sample_points() {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for fold in &folds {
                let train_labels: Vec<Cell> = fold.train.iter().map(|&i| labels[i].clone()).collect();
                let val_labels: Vec<Cell> =
                    fold.validation.iter().map(|&i| labels[i].clone()).collect();
                let estimator = Estimator::fit(
                    self.algorithm,
                    &params,
                    self.model_seed,
                    &features.select_rows(&fold.train),
                    &train_labels,
                )?;
                fold_scores.push(estimator.score(&features.select_rows(&fold.validation), &val_labels)?);
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            tracing::debug!(algorithm = %self.algorithm, ?params, mean_score, "Scored candidate");
            candidates.push(CandidateScore {
                params,
                fold_scores,
                mean_score,
            });
        }

        let mut best = 0;
        for (i, c) in candidates.iter().enumerate() {
            if c.mean_score > candidates[best].mean_score {
                best = i;
            }
        }
        let best_params = candidates[best].params.clone();
        let best_score = candidates[best].mean_score;
        let best_estimator =
            Estimator::fit(self.algorithm, &best_params, self.model_seed, features, labels)?;

        Ok(SearchOutcome {
            best_params,
            best_score,
            best_estimator,
            candidates,
        })
    }
}
