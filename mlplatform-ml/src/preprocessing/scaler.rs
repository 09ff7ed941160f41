//! Standard (z-score) scaling of a single numeric column.

use serde::{Deserialize, Serialize};

/// Fitted mean and scale for one column.
///
/// The scale is the population standard deviation; a constant column gets a
/// scale of 1 so it maps to zero rather than dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub scale: f64,
}

impl StandardScaler {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                scale: 1.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            mean,
            scale: if std > f64::EPSILON { std } else { 1.0 },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}
