//! One-hot encoding of a single categorical column.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categories learned at fit time, in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Append the indicator vector for `value`. Unknown values encode as all zeros.
    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let hit = self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok();
        out.extend((0..self.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
    }
}
