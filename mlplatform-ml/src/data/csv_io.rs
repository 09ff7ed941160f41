//! CSV reading and writing for datasets.

use crate::data::dataset::{Cell, Dataset, format_number};
use crate::error::{MlError, Result};
use std::path::Path;

/// Tokens read as a missing value.
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>"];

fn parse_cell(raw: &str) -> Cell {
    if MISSING_TOKENS.contains(&raw) {
        return Cell::Missing;
    }
    match raw.parse::<f64>() {
        Ok(v) => Cell::Number(v),
        Err(_) => Cell::Text(raw.to_string()),
    }
}

/// Parse CSV bytes (header row required) into a dataset.
pub fn parse_csv(data: &[u8]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(MlError::dataset("CSV has no header row"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(parse_cell).collect());
    }
    Dataset::new(columns, rows)
}

/// Read a CSV file into a dataset.
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let data = std::fs::read(path)
        .map_err(|e| MlError::dataset(format!("Failed to read {}: {e}", path.display())))?;
    parse_csv(&data)
}

/// Serialize a dataset as CSV bytes (header row, no index column).
pub fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.columns())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|cell| match cell {
            Cell::Number(v) => format_number(*v),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }))?;
    }
    writer
        .into_inner()
        .map_err(|e| MlError::dataset(format!("Failed to flush CSV: {e}")))
}

/// Write a dataset to a CSV file, creating parent directories.
pub fn write_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let bytes = to_csv_bytes(dataset)?;
    mlplatform_core::persistence::atomic_write(path, &bytes)?;
    Ok(())
}
