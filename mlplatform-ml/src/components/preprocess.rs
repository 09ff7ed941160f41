//! Preprocessor stage: clean, normalize the label, split train/test.

use crate::artifact::Artifact;
use crate::data::{BinaryLabelMapping, read_csv, train_test_split, write_csv};
use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub train_ratio: f64,
    pub seed: u64,
    pub label_mapping: BinaryLabelMapping,
}

impl PreprocessOptions {
    pub fn new(train_ratio: f64) -> Self {
        Self {
            train_ratio,
            seed: 42,
            label_mapping: BinaryLabelMapping::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Train and test dataset artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArtifacts {
    pub train: Artifact,
    pub test: Artifact,
}

/// Drop incomplete rows, map a `{positive, negative}` label to `{1, 0}`, and
/// split deterministically into `train` and `test`.
pub fn preprocess_data(
    input: &Artifact,
    options: &PreprocessOptions,
    train: Artifact,
    test: Artifact,
) -> Result<SplitArtifacts> {
    if !(options.train_ratio > 0.0 && options.train_ratio < 1.0) {
        return Err(MlError::invalid_input(format!(
            "train_ratio must be in (0, 1), got {}",
            options.train_ratio
        )));
    }

    let mut dataset = read_csv(&input.path())?;
    let dropped = dataset.drop_missing();
    if dropped > 0 {
        tracing::debug!(dropped, remaining = dataset.n_rows(), "Dropped incomplete rows");
    }
    if options.label_mapping.apply(&mut dataset)? {
        tracing::debug!(
            positive = %options.label_mapping.positive,
            negative = %options.label_mapping.negative,
            "Mapped binary label to 1/0"
        );
    }

    let (train_set, test_set) = train_test_split(&dataset, options.train_ratio, options.seed)?;
    write_csv(&train.path(), &train_set)?;
    write_csv(&test.path(), &test_set)?;
    tracing::info!(
        train_rows = train_set.n_rows(),
        test_rows = test_set.n_rows(),
        seed = options.seed,
        "Split dataset"
    );

    Ok(SplitArtifacts {
        train: train.with_metadata("format", json!("csv")),
        test: test.with_metadata("format", json!("csv")),
    })
}
