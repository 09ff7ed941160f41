//! Column-wise preprocessing of a feature dataset into a dense matrix.
//!
//! Output layout: every numeric column (scaled) in input order, followed by
//! the one-hot blocks of every categorical column in input order. Columns are
//! looked up by name at transform time, so inputs may arrive with columns in
//! a different order.

use crate::data::dataset::{Cell, ColumnKind, Dataset};
use crate::error::{MlError, Result};
use crate::preprocessing::encoder::OneHotEncoder;
use crate::preprocessing::scaler::StandardScaler;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericColumn {
    column: String,
    scaler: StandardScaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalColumn {
    column: String,
    encoder: OneHotEncoder,
}

/// Fitted preprocessing for a fixed set of feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
}

impl ColumnTransformer {
    /// Learn scaling statistics and category sets from `features`.
    pub fn fit(features: &Dataset) -> Result<Self> {
        if features.n_cols() == 0 {
            return Err(MlError::dataset("no feature columns to fit"));
        }
        if features.is_empty() {
            return Err(MlError::dataset("cannot fit preprocessing on zero rows"));
        }

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for (idx, (name, kind)) in features.columns().iter().zip(features.kinds()).enumerate() {
            match kind {
                ColumnKind::Numeric => {
                    let values: Vec<f64> = features.column(idx).filter_map(Cell::as_f64).collect();
                    numeric.push(NumericColumn {
                        column: name.clone(),
                        scaler: StandardScaler::fit(&values),
                    });
                }
                ColumnKind::Categorical => {
                    let keys: Vec<String> = features.column(idx).map(Cell::key).collect();
                    categorical.push(CategoricalColumn {
                        column: name.clone(),
                        encoder: OneHotEncoder::fit(keys.iter().map(String::as_str)),
                    });
                }
            }
        }

        tracing::debug!(
            numeric = numeric.len(),
            categorical = categorical.len(),
            "Fitted column transformer"
        );
        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// Names of the input columns this transformer expects.
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.column.as_str())
            .chain(self.categorical.iter().map(|c| c.column.as_str()))
            .collect()
    }

    /// Width of a transformed row.
    pub fn n_output_features(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.encoder.width()).sum::<usize>()
    }

    /// Transform every row of `features` into a dense vector.
    pub fn transform(&self, features: &Dataset) -> Result<Vec<Vec<f64>>> {
        let lookup = |name: &str| {
            features.column_index(name).ok_or_else(|| {
                MlError::dataset(format!("input is missing feature column '{name}'"))
            })
        };
        let numeric_idx = self
            .numeric
            .iter()
            .map(|c| lookup(&c.column))
            .collect::<Result<Vec<_>>>()?;
        let categorical_idx = self
            .categorical
            .iter()
            .map(|c| lookup(&c.column))
            .collect::<Result<Vec<_>>>()?;

        let width = self.n_output_features();
        let mut out = Vec::with_capacity(features.n_rows());
        for (row_no, row) in features.rows().iter().enumerate() {
            let mut encoded = Vec::with_capacity(width);
            for (col, &idx) in self.numeric.iter().zip(&numeric_idx) {
                let value = row[idx].as_f64().ok_or_else(|| {
                    MlError::dataset(format!(
                        "row {row_no}: column '{}' expects a number, got '{}'",
                        col.column, row[idx]
                    ))
                })?;
                encoded.push(col.scaler.transform(value));
            }
            for (col, &idx) in self.categorical.iter().zip(&categorical_idx) {
                col.encoder.encode_into(&row[idx].key(), &mut encoded);
            }
            out.push(encoded);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn features() -> Dataset {
        Dataset::new(
            vec!["Type".into(), "Age".into(), "Fee".into()],
            vec![
                vec!["Dog".into(), Cell::Number(1.0), Cell::Number(10.0)],
                vec!["Cat".into(), Cell::Number(3.0), Cell::Number(10.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_first_then_one_hot() {
        let ct = ColumnTransformer::fit(&features()).unwrap();
        assert_eq!(ct.input_columns(), vec!["Age", "Fee", "Type"]);
        assert_eq!(ct.n_output_features(), 4);

        let x = ct.transform(&features()).unwrap();
        assert_eq!(x[0], vec![-1.0, 0.0, 0.0, 1.0]);
        assert_eq!(x[1], vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_columns_matched_by_name() {
        let ct = ColumnTransformer::fit(&features()).unwrap();
        let reordered = Dataset::new(
            vec!["Fee".into(), "Type".into(), "Age".into(), "Extra".into()],
            vec![vec![Cell::Number(10.0), "Bird".into(), Cell::Number(2.0), "x".into()]],
        )
        .unwrap();
        let x = ct.transform(&reordered).unwrap();
        assert_eq!(x[0], vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_column_and_bad_number() {
        let ct = ColumnTransformer::fit(&features()).unwrap();
        let missing = Dataset::new(vec!["Age".into()], vec![vec![Cell::Number(1.0)]]).unwrap();
        assert!(ct.transform(&missing).is_err());

        let bad = Dataset::new(
            vec!["Type".into(), "Age".into(), "Fee".into()],
            vec![vec!["Dog".into(), "old".into(), Cell::Number(1.0)]],
        )
        .unwrap();
        assert!(ct.transform(&bad).is_err());
    }

    #[test]
    fn test_fit_requires_rows() {
        let empty = Dataset::empty(vec!["a".into()]);
        assert!(ColumnTransformer::fit(&empty).is_err());
    }
}
