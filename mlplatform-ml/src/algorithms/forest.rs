//! Random forest classifier: bootstrap-sampled gini trees whose class
//! probabilities are averaged.

use crate::algorithms::tree::{DecisionTreeClassifier, MaxFeatures, TreeParams};
use crate::error::{MlError, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    pub n_estimators: usize,
    pub tree_params: TreeParams,
    pub bootstrap: bool,
    pub seed: u64,
    trees: Vec<DecisionTreeClassifier>,
    n_classes: usize,
}

impl RandomForestClassifier {
    /// A forest of `n_estimators` trees considering `sqrt(n_features)` at each split.
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            tree_params: TreeParams {
                max_features: MaxFeatures::Sqrt,
                ..TreeParams::default()
            },
            bootstrap: true,
            seed,
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.tree_params.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.tree_params.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.tree_params.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.tree_params.max_features = max_features;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(MlError::training("n_estimators must be at least 1"));
        }
        if x.is_empty() {
            return Err(MlError::training("cannot fit a forest on zero rows"));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let tree_seed = rng.next_u64();
            let indices: Vec<usize> = if self.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            let mut tree = DecisionTreeClassifier::new(self.tree_params.clone(), tree_seed);
            tree.fit_indices(x, y, n_classes, &indices)?;
            trees.push(tree);
        }

        tracing::debug!(trees = trees.len(), rows = n, "Fitted random forest");
        self.trees = trees;
        self.n_classes = n_classes;
        Ok(())
    }

    /// Mean of the per-tree class probabilities.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.trees.is_empty() {
            return Err(MlError::model("random forest is not fitted"));
        }
        let mut totals = vec![vec![0.0; self.n_classes]; x.len()];
        for tree in &self.trees {
            for (acc, proba) in totals.iter_mut().zip(tree.predict_proba(x)?) {
                for (a, p) in acc.iter_mut().zip(proba) {
                    *a += p;
                }
            }
        }
        let n_trees = self.trees.len() as f64;
        for row in &mut totals {
            for p in row.iter_mut() {
                *p /= n_trees;
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tree::argmax;

    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let jitter = (i % 7) as f64 * 0.1;
            if i % 2 == 0 {
                x.push(vec![1.0 + jitter, 2.0 - jitter, jitter]);
                y.push(0);
            } else {
                x.push(vec![5.0 + jitter, 6.0 - jitter, 3.0 + jitter]);
                y.push(1);
            }
        }
        (x, y)
    }

    #[test]
    fn test_separable_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForestClassifier::new(15, 0);
        forest.fit(&x, &y, 2).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let proba = forest.predict_proba(&x).unwrap();
        let predicted: Vec<usize> = proba.iter().map(|p| argmax(p)).collect();
        assert_eq!(predicted, y);
        for p in &proba {
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = blobs();
        let mut a = RandomForestClassifier::new(5, 7).with_max_depth(Some(3));
        let mut b = RandomForestClassifier::new(5, 7).with_max_depth(Some(3));
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_empty_and_unfitted() {
        let forest = RandomForestClassifier::new(3, 0);
        assert!(forest.predict_proba(&[vec![1.0]]).is_err());
        let mut forest = RandomForestClassifier::new(3, 0);
        assert!(forest.fit(&[], &[], 2).is_err());
        let mut none = RandomForestClassifier::new(0, 0);
        assert!(none.fit(&[vec![1.0]], &[0], 1).is_err());
    }
}
