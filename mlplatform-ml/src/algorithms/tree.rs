//! CART decision tree classifier with gini impurity.

use crate::error::{MlError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Tree growth limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum TreeNode {
    Leaf {
        /// Class probabilities at this leaf.
        distribution: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Decision tree over dense features and class indices `0..n_classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    pub params: TreeParams,
    pub seed: u64,
    n_classes: usize,
    n_features: usize,
    root: Option<TreeNode>,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    params: &'a TreeParams,
    k_features: usize,
    rng: StdRng,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl Grower<'_> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&self, counts: &[usize], n_samples: usize) -> TreeNode {
        let total = n_samples.max(1) as f64;
        TreeNode::Leaf {
            distribution: counts.iter().map(|&c| c as f64 / total).collect(),
            n_samples,
        }
    }

    fn grow(&mut self, indices: &[usize], depth: usize) -> TreeNode {
        let n = indices.len();
        let counts = self.class_counts(indices);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let stop = pure
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.params.max_depth.is_some_and(|d| depth >= d);
        if stop {
            return self.leaf(&counts, n);
        }

        let Some((feature, threshold)) = self.best_split(indices, &counts) else {
            return self.leaf(&counts, n);
        };
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| self.x[i][feature] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(&left, depth + 1)),
            right: Box::new(self.grow(&right, depth + 1)),
            n_samples: n,
        }
    }

    fn best_split(&mut self, indices: &[usize], counts: &[usize]) -> Option<(usize, f64)> {
        let n_features = self.x[indices[0]].len();
        let candidates =
            rand::seq::index::sample(&mut self.rng, n_features, self.k_features).into_vec();

        let n = indices.len();
        let parent = gini(counts, n);
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = 1e-12;

        let mut sorted = indices.to_vec();
        for feature in candidates {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            for pos in 0..n - 1 {
                let class = self.y[sorted[pos]];
                left[class] += 1;
                right[class] -= 1;

                let n_left = pos + 1;
                let n_right = n - n_left;
                let here = self.x[sorted[pos]][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if here >= next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let gain = parent - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, here + (next - here) / 2.0));
                }
            }
        }
        best
    }
}

impl DecisionTreeClassifier {
    pub fn new(params: TreeParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_classes: 0,
            n_features: 0,
            root: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit on rows `x` with class indices `y` in `0..n_classes`.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        let indices: Vec<usize> = (0..x.len()).collect();
        self.fit_indices(x, y, n_classes, &indices)
    }

    /// Fit on the subset (with repetition allowed) of rows named by `indices`.
    pub(crate) fn fit_indices(
        &mut self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        indices: &[usize],
    ) -> Result<()> {
        if x.len() != y.len() {
            return Err(MlError::training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if indices.is_empty() {
            return Err(MlError::training("cannot fit a tree on zero rows"));
        }
        if n_classes == 0 || y.iter().any(|&c| c >= n_classes) {
            return Err(MlError::training("class index out of range"));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|r| r.len() != n_features) {
            return Err(MlError::training("feature rows must share a non-zero width"));
        }

        let mut grower = Grower {
            x,
            y,
            n_classes,
            params: &self.params,
            k_features: self.params.max_features.resolve(n_features),
            rng: StdRng::seed_from_u64(self.seed),
        };
        let root = grower.grow(indices, 0);

        self.n_classes = n_classes;
        self.n_features = n_features;
        self.root = Some(root);
        Ok(())
    }

    /// Class probabilities for each row.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| MlError::model("decision tree is not fitted"))?;
        x.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(MlError::model(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { distribution, .. } => return Ok(distribution.clone()),
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if row[*feature] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }

    pub fn n_leaves(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

/// Index of the largest probability; ties go to the lowest index.
pub fn argmax(probabilities: &[f64]) -> usize {
    let mut best = 0;
    for (i, &p) in probabilities.iter().enumerate() {
        if p > probabilities[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and_like() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.1, 0.1],
            vec![0.1, 0.9],
            vec![0.9, 0.1],
            vec![0.9, 0.9],
        ];
        let y = vec![0, 0, 0, 1, 0, 0, 0, 1];
        (x, y)
    }

    #[test]
    fn test_fits_training_data() {
        let (x, y) = and_like();
        let mut tree = DecisionTreeClassifier::new(TreeParams::default(), 0);
        tree.fit(&x, &y, 2).unwrap();
        let predicted: Vec<usize> = tree
            .predict_proba(&x)
            .unwrap()
            .iter()
            .map(|p| argmax(p))
            .collect();
        assert_eq!(predicted, y);
        assert!(tree.depth() >= 2);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let (x, y) = and_like();
        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let mut tree = DecisionTreeClassifier::new(params, 0);
        tree.fit(&x, &y, 2).unwrap();
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..10).map(|i| usize::from(i >= 9)).collect();
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let mut tree = DecisionTreeClassifier::new(params, 0);
        tree.fit(&x, &y, 2).unwrap();
        // The lone positive cannot be isolated into its own leaf.
        let proba = tree.predict_proba(&[vec![9.0]]).unwrap();
        assert!(proba[0][1] < 1.0);
    }

    #[test]
    fn test_pure_input_is_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let mut tree = DecisionTreeClassifier::new(TreeParams::default(), 0);
        tree.fit(&x, &[1, 1, 1], 2).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_proba(&[vec![0.0]]).unwrap()[0], vec![0.0, 1.0]);
    }

    #[test]
    fn test_unfitted_and_width_errors() {
        let tree = DecisionTreeClassifier::new(TreeParams::default(), 0);
        assert!(tree.predict_proba(&[vec![1.0]]).is_err());

        let mut tree = DecisionTreeClassifier::new(TreeParams::default(), 0);
        tree.fit(&[vec![1.0], vec![2.0]], &[0, 1], 2).unwrap();
        assert!(tree.predict_proba(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(10), 10);
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }

    #[test]
    fn test_argmax_ties_take_lowest() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.7, 0.1]), 1);
    }
}
