//! Classification metrics.

use crate::data::dataset::Cell;
use crate::error::{MlError, Result};

/// Fraction of positions where `predicted` matches `truth`.
///
/// Labels compare by canonical text, so a numeric `1` matches the text `"1"`.
pub fn accuracy_score(truth: &[Cell], predicted: &[Cell]) -> Result<f64> {
    if truth.len() != predicted.len() {
        return Err(MlError::evaluation(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(MlError::evaluation("accuracy is undefined for zero samples"));
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t.key() == p.key())
        .count();
    Ok(correct as f64 / truth.len() as f64)
}
