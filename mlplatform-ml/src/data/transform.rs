//! Row-level dataset transforms: label remapping, seeded splitting, sampling.

use crate::data::dataset::{Cell, Dataset};
use crate::error::{MlError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Maps a two-valued text label onto `1` / `0`.
///
/// Applied only when the label's distinct value set is exactly
/// `{positive, negative}` (case-sensitive); any other label encoding is left
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryLabelMapping {
    pub positive: String,
    pub negative: String,
}

impl Default for BinaryLabelMapping {
    fn default() -> Self {
        Self {
            positive: "Yes".to_string(),
            negative: "No".to_string(),
        }
    }
}

impl BinaryLabelMapping {
    /// Remap the trailing label column in place. Returns whether it applied.
    pub fn apply(&self, dataset: &mut Dataset) -> Result<bool> {
        let idx = dataset.label_index()?;
        let distinct = dataset.distinct_values(idx);
        let matches = distinct.len() == 2
            && distinct.contains(&self.positive)
            && distinct.contains(&self.negative);
        if !matches {
            tracing::debug!(?distinct, "Label column left unchanged");
            return Ok(false);
        }
        let positive = self.positive.clone();
        dataset.map_column(idx, |cell| {
            if cell.key() == positive {
                Cell::Number(1.0)
            } else {
                Cell::Number(0.0)
            }
        });
        Ok(true)
    }
}

/// Number of training rows for `n` rows at `train_ratio`.
pub fn train_size(n: usize, train_ratio: f64) -> usize {
    // Guard against products like 0.7 * 10 = 6.999...
    ((train_ratio * n as f64) + 1e-9).floor() as usize
}

/// Split rows into `(train, test)` partitions with a seeded permutation.
///
/// The first `n - train_size` permuted rows form the test partition and the
/// remainder the training partition. Both must be non-empty.
pub fn train_test_split(dataset: &Dataset, train_ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(MlError::invalid_input(format!(
            "train_ratio must be in (0, 1), got {train_ratio}"
        )));
    }
    let n = dataset.n_rows();
    let n_train = train_size(n, train_ratio);
    let n_test = n - n_train;
    if n_train == 0 || n_test == 0 {
        return Err(MlError::dataset(format!(
            "train_ratio {train_ratio} on {n} rows leaves an empty partition \
             (train={n_train}, test={n_test})"
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let (test_idx, train_idx) = permutation.split_at(n_test);
    Ok((dataset.select_rows(train_idx), dataset.select_rows(test_idx)))
}

/// Draw `n` distinct rows at random. Fails when the dataset has fewer rows.
pub fn sample_rows<R: rand::Rng + ?Sized>(dataset: &Dataset, n: usize, rng: &mut R) -> Result<Dataset> {
    if n > dataset.n_rows() {
        return Err(MlError::invalid_input(format!(
            "cannot sample {n} rows from a dataset of {} rows",
            dataset.n_rows()
        )));
    }
    let picked = rand::seq::index::sample(rng, dataset.n_rows(), n).into_vec();
    Ok(dataset.select_rows(&picked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ColumnKind;
    use std::collections::HashSet;

    fn labelled(n: usize) -> Dataset {
        let rows = (0..n)
            .map(|i| {
                vec![
                    Cell::Number(i as f64),
                    Cell::Text(if i % 3 == 0 { "No" } else { "Yes" }.into()),
                ]
            })
            .collect();
        Dataset::new(vec!["id".into(), "label".into()], rows).unwrap()
    }

    #[test]
    fn test_yes_no_mapping() {
        let mut ds = labelled(9);
        assert!(BinaryLabelMapping::default().apply(&mut ds).unwrap());
        assert_eq!(ds.column_kind("label"), Some(ColumnKind::Numeric));
        assert_eq!(ds.rows()[0][1], Cell::Number(0.0));
        assert_eq!(ds.rows()[1][1], Cell::Number(1.0));
    }

    #[test]
    fn test_mapping_requires_exact_set() {
        let mut only_yes = Dataset::new(
            vec!["x".into(), "label".into()],
            vec![vec![Cell::Number(1.0), "Yes".into()]],
        )
        .unwrap();
        assert!(!BinaryLabelMapping::default().apply(&mut only_yes).unwrap());

        let mut lower = Dataset::new(
            vec!["x".into(), "label".into()],
            vec![
                vec![Cell::Number(1.0), "yes".into()],
                vec![Cell::Number(2.0), "no".into()],
            ],
        )
        .unwrap();
        assert!(!BinaryLabelMapping::default().apply(&mut lower).unwrap());

        let custom = BinaryLabelMapping {
            positive: "yes".into(),
            negative: "no".into(),
        };
        assert!(custom.apply(&mut lower).unwrap());
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let ds = labelled(100);
        let (train, test) = train_test_split(&ds, 0.7, 42).unwrap();
        assert_eq!(train.n_rows(), 70);
        assert_eq!(test.n_rows(), 30);

        let ids = |d: &Dataset| -> HashSet<i64> {
            d.column(0).map(|c| c.as_f64().unwrap() as i64).collect()
        };
        let train_ids = ids(&train);
        let test_ids = ids(&test);
        assert!(train_ids.is_disjoint(&test_ids));
        assert_eq!(train_ids.len() + test_ids.len(), 100);
    }

    #[test]
    fn test_split_is_deterministic() {
        let ds = labelled(50);
        let a = train_test_split(&ds, 0.8, 42).unwrap();
        let b = train_test_split(&ds, 0.8, 42).unwrap();
        assert_eq!(a, b);
        let c = train_test_split(&ds, 0.8, 7).unwrap();
        assert_ne!(a.0, c.0);
    }

    #[test]
    fn test_split_rejects_bad_ratio() {
        let ds = labelled(10);
        assert!(train_test_split(&ds, 0.0, 42).is_err());
        assert!(train_test_split(&ds, 1.0, 42).is_err());
        assert!(train_test_split(&labelled(1), 0.5, 42).is_err());
    }

    #[test]
    fn test_sample_rows() {
        let ds = labelled(50);
        let mut rng = StdRng::seed_from_u64(3);
        let sample = sample_rows(&ds, 4, &mut rng).unwrap();
        assert_eq!(sample.n_rows(), 4);
        assert!(sample_rows(&ds, 51, &mut rng).is_err());
    }
}
