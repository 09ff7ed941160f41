//! In-memory tabular dataset.
//!
//! Rows are records, columns are features plus one trailing label column.
//! A column is numeric when every non-missing cell is a number; otherwise it
//! is categorical and all of its cells are held as text.

use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// A single value in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.parse().ok(),
            Cell::Missing => None,
        }
    }

    /// Canonical text form, used for category and class identity.
    pub fn key(&self) -> String {
        match self {
            Cell::Number(v) => format_number(*v),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }

    /// Total order: missing < numbers (numerically) < text (lexically).
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Missing, _) => Ordering::Less,
            (_, Cell::Missing) => Ordering::Greater,
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// Integral values print without a fractional part.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Column type as seen by the preprocessing transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// A tabular dataset with typed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Build a dataset, inferring column kinds from the cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(MlError::dataset(format!(
                "row {i} has {} values but the header has {} columns",
                row.len(),
                columns.len()
            )));
        }
        let mut dataset = Self {
            kinds: vec![ColumnKind::Numeric; columns.len()],
            columns,
            rows,
        };
        dataset.infer_kinds();
        Ok(dataset)
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            kinds: vec![ColumnKind::Numeric; columns.len()],
            columns,
            rows: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|i| self.kinds[i])
    }

    /// Cells of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Names of the categorical columns.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == ColumnKind::Categorical)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    /// Index of the trailing label column.
    pub fn label_index(&self) -> Result<usize> {
        self.columns
            .len()
            .checked_sub(1)
            .ok_or_else(|| MlError::dataset("dataset has no columns"))
    }

    /// Distinct canonical values of a column.
    pub fn distinct_values(&self, idx: usize) -> BTreeSet<String> {
        self.column(idx).map(Cell::key).collect()
    }

    /// Remove every row with a missing cell. Returns the number removed.
    pub fn drop_missing(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !r.iter().any(Cell::is_missing));
        self.infer_kinds();
        before - self.rows.len()
    }

    /// Replace every cell of a column and re-infer its kind.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        self.infer_kinds();
    }

    /// Dataset made of the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Drop a column by name. Returns false when no such column exists.
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.remove_column(idx);
                true
            }
            None => false,
        }
    }

    /// Drop the trailing column.
    pub fn drop_last_column(&mut self) -> Result<()> {
        let idx = self.label_index()?;
        self.remove_column(idx);
        Ok(())
    }

    /// Separate the trailing label column from the features.
    pub fn split_label(&self) -> Result<(Dataset, Vec<Cell>)> {
        let idx = self.label_index()?;
        let labels = self.column(idx).cloned().collect();
        let mut features = self.clone();
        features.remove_column(idx);
        Ok((features, labels))
    }

    fn remove_column(&mut self, idx: usize) {
        self.columns.remove(idx);
        self.kinds.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
    }

    fn infer_kinds(&mut self) {
        for idx in 0..self.columns.len() {
            let numeric = self
                .rows
                .iter()
                .all(|r| matches!(r[idx], Cell::Number(_) | Cell::Missing));
            self.kinds[idx] = if numeric {
                ColumnKind::Numeric
            } else {
                ColumnKind::Categorical
            };
            if !numeric {
                for row in &mut self.rows {
                    if let Cell::Number(v) = row[idx] {
                        row[idx] = Cell::Text(format_number(v));
                    }
                }
            }
        }
    }
}
