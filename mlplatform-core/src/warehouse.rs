//! Append-only warehouse sink.
//!
//! Batch predictions land in a warehouse table through [`Warehouse::append`].
//! The load job is awaited before returning; the target table is created on
//! first write from the supplied schema and is never reconciled afterwards,
//! so a schema mismatch surfaces as the backend's own error.

use crate::error::{PlatformError, WarehouseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A `[project.]dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(table_ref: &str) -> Result<Self, WarehouseError> {
        let invalid = || WarehouseError::InvalidTableRef {
            table_ref: table_ref.to_string(),
        };
        let parts: Vec<&str> = table_ref.split('.').collect();
        let (project, dataset, table) = match parts.as_slice() {
            [dataset, table] => (None, *dataset, *table),
            [project, dataset, table] => (Some(*project), *dataset, *table),
            _ => return Err(invalid()),
        };
        let valid = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if !valid(dataset) || !valid(table) || project.is_some_and(|p| !valid(p)) {
            return Err(invalid());
        }
        Ok(Self {
            project: project.map(str::to_string),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    /// Table identifier within a single-project store.
    fn local_name(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(p) => write!(f, "{p}.{}.{}", self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

/// Column type in a load schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Float,
    Integer,
    String,
}

impl FieldType {
    fn sql_type(self) -> &'static str {
        match self {
            FieldType::Float => "REAL",
            FieldType::Integer => "INTEGER",
            FieldType::String => "TEXT",
        }
    }
}

/// A named, typed column of a load schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A single cell written to the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Null,
}

impl rusqlite::ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value};
        Ok(match self {
            FieldValue::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            FieldValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            FieldValue::String(v) => ToSqlOutput::Owned(Value::Text(v.clone())),
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// A completed append job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadJob {
    pub job_id: String,
    pub table_ref: String,
    pub rows_written: usize,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Append-only table sink.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Append `rows` to `table`, creating it from `schema` if absent, and
    /// wait for the load to complete.
    async fn append(
        &self,
        table: &TableRef,
        schema: &[SchemaField],
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<LoadJob, PlatformError>;

    /// Number of rows currently stored in `table`.
    async fn row_count(&self, table: &TableRef) -> Result<usize, PlatformError>;
}

/// Warehouse backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteWarehouse {
    db_path: PathBuf,
}

impl SqliteWarehouse {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Read back a single float column, in insertion order.
    pub async fn read_float_column(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Vec<f64>, PlatformError> {
        let db_path = self.db_path.clone();
        let sql = format!(
            "SELECT \"{}\" FROM \"{}\" ORDER BY rowid",
            column.replace('"', "\"\""),
            table.local_name()
        );
        let values = tokio::task::spawn_blocking(move || -> Result<Vec<f64>, WarehouseError> {
            let conn = rusqlite::Connection::open(&db_path)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, f64>(0))?;
            let values = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(values)
        })
        .await
        .map_err(|e| join_failure(table, e))??;
        Ok(values)
    }

    /// Column names of a table, in declaration order.
    pub async fn column_names(&self, table: &TableRef) -> Result<Vec<String>, PlatformError> {
        let db_path = self.db_path.clone();
        let name = table.local_name();
        let names = tokio::task::spawn_blocking(move || -> Result<Vec<String>, WarehouseError> {
            let conn = rusqlite::Connection::open(&db_path)?;
            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let rows = stmt.query_map([&name], |row| row.get::<_, String>(0))?;
            let names = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
        .map_err(|e| join_failure(table, e))??;
        Ok(names)
    }
}

fn join_failure(table: &TableRef, err: tokio::task::JoinError) -> WarehouseError {
    WarehouseError::LoadFailed {
        table_ref: table.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn append(
        &self,
        table: &TableRef,
        schema: &[SchemaField],
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<LoadJob, PlatformError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != schema.len()) {
            return Err(WarehouseError::LoadFailed {
                table_ref: table.to_string(),
                message: format!(
                    "row has {} values but the schema has {} fields",
                    bad.len(),
                    schema.len()
                ),
            }
            .into());
        }

        let db_path = self.db_path.clone();
        let name = table.local_name();
        let columns: Vec<String> = schema
            .iter()
            .map(|f| format!("\"{}\"", f.name.replace('"', "\"\"")))
            .collect();
        let create = format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" ({})",
            schema
                .iter()
                .zip(&columns)
                .map(|(f, c)| format!("{c} {}", f.field_type.sql_type()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let insert = format!(
            "INSERT INTO \"{name}\" ({}) VALUES ({})",
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let written = tokio::task::spawn_blocking(move || -> Result<usize, WarehouseError> {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut conn = rusqlite::Connection::open(&db_path)?;
            let tx = conn.transaction()?;
            tx.execute(&create, [])?;
            {
                let mut stmt = tx.prepare(&insert)?;
                for row in &rows {
                    stmt.execute(rusqlite::params_from_iter(row.iter()))?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
        .await
        .map_err(|e| join_failure(table, e))??;

        let job = LoadJob {
            job_id: format!("load-{}", chrono::Utc::now().timestamp_micros()),
            table_ref: table.to_string(),
            rows_written: written,
            completed_at: chrono::Utc::now(),
        };
        tracing::info!(table = %table, rows = written, "Warehouse load job completed");
        Ok(job)
    }

    async fn row_count(&self, table: &TableRef) -> Result<usize, PlatformError> {
        let db_path = self.db_path.clone();
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", table.local_name());
        let count = tokio::task::spawn_blocking(move || -> Result<i64, WarehouseError> {
            let conn = rusqlite::Connection::open(&db_path)?;
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        })
        .await
        .map_err(|e| join_failure(table, e))??;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prediction_schema() -> Vec<SchemaField> {
        vec![SchemaField::new("prediction", FieldType::Float)]
    }

    #[test]
    fn test_table_ref_parse() {
        let t = TableRef::parse("ml-platform-dev.predictions.pets").unwrap();
        assert_eq!(t.project.as_deref(), Some("ml-platform-dev"));
        assert_eq!(t.dataset, "predictions");
        assert_eq!(t.table, "pets");
        assert_eq!(t.to_string(), "ml-platform-dev.predictions.pets");

        let t = TableRef::parse("predictions.pets").unwrap();
        assert!(t.project.is_none());

        assert!(TableRef::parse("pets").is_err());
        assert!(TableRef::parse("a.b.c.d").is_err());
        assert!(TableRef::parse("predictions.pe\"ts").is_err());
        assert!(TableRef::parse("predictions.").is_err());
    }

    #[tokio::test]
    async fn test_append_accumulates_rows() {
        let dir = TempDir::new().unwrap();
        let wh = SqliteWarehouse::new(dir.path().join("wh").join("warehouse.db"));
        let table = TableRef::parse("predictions.pets").unwrap();

        let job = wh
            .append(
                &table,
                &prediction_schema(),
                vec![vec![FieldValue::Float(1.0)], vec![FieldValue::Float(0.0)]],
            )
            .await
            .unwrap();
        assert_eq!(job.rows_written, 2);

        wh.append(&table, &prediction_schema(), vec![vec![FieldValue::Float(1.0)]])
            .await
            .unwrap();
        assert_eq!(wh.row_count(&table).await.unwrap(), 3);
        assert_eq!(wh.column_names(&table).await.unwrap(), vec!["prediction"]);
        assert_eq!(
            wh.read_float_column(&table, "prediction").await.unwrap(),
            vec![1.0, 0.0, 1.0]
        );
    }

    #[tokio::test]
    async fn test_schema_is_not_reconciled() {
        let dir = TempDir::new().unwrap();
        let wh = SqliteWarehouse::new(dir.path().join("warehouse.db"));
        let table = TableRef::parse("predictions.pets").unwrap();
        wh.append(
            &table,
            &[SchemaField::new("score", FieldType::Float)],
            vec![vec![FieldValue::Float(0.5)]],
        )
        .await
        .unwrap();

        let err = wh
            .append(&table, &prediction_schema(), vec![vec![FieldValue::Float(1.0)]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::Warehouse(WarehouseError::Sqlite(_))
        ));
    }

    #[tokio::test]
    async fn test_row_width_mismatch() {
        let dir = TempDir::new().unwrap();
        let wh = SqliteWarehouse::new(dir.path().join("warehouse.db"));
        let table = TableRef::parse("predictions.pets").unwrap();
        let err = wh
            .append(
                &table,
                &prediction_schema(),
                vec![vec![FieldValue::Float(1.0), FieldValue::Null]],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::Warehouse(WarehouseError::LoadFailed { .. })
        ));
    }
}
