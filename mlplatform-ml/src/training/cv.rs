//! Stratified k-fold cross-validation splits.

use crate::data::dataset::Cell;
use crate::error::{MlError, Result};
use std::collections::BTreeMap;

/// One train/validation split, as row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Stratified k-fold without shuffling.
///
/// Rows are grouped by class (classes in sorted order, rows in input
/// order) and dealt round-robin onto the folds, so every fold gets a share of
/// each class proportional to its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, labels: &[Cell]) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(MlError::training(format!(
                "cross-validation needs at least 2 folds, got {k}"
            )));
        }
        if labels.len() < k {
            return Err(MlError::training(format!(
                "cannot split {} rows into {k} folds",
                labels.len()
            )));
        }

        let mut by_class: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            by_class.entry(label.key()).or_default().push(i);
        }
        for (class, rows) in &by_class {
            if rows.len() < k {
                tracing::warn!(
                    class = %class,
                    members = rows.len(),
                    folds = k,
                    "Least populated class has fewer members than folds"
                );
            }
        }

        let mut assignment = vec![0usize; labels.len()];
        let mut next = 0usize;
        for rows in by_class.values() {
            for &row in rows {
                assignment[row] = next % k;
                next += 1;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| assignment[i] == fold);
                Fold { train, validation }
            })
            .collect())
    }
}
