//! Error types for the mlplatform core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering storage locators, configuration, object storage, and the
//! warehouse sink.

use std::path::PathBuf;

/// Top-level error type for the mlplatform core library.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from parsing an object-storage locator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    #[error("Invalid storage locator '{locator}': expected the '{scheme}' scheme")]
    MissingScheme { locator: String, scheme: String },

    #[error("Invalid storage locator '{locator}': expected <bucket>/<object> after the scheme")]
    MissingPath { locator: String },

    #[error("Invalid storage locator '{locator}': bucket name is empty")]
    EmptyBucket { locator: String },

    #[error("Invalid storage locator '{locator}': object path is empty")]
    EmptyObject { locator: String },

    #[error("Invalid storage locator '{locator}': path segment '{segment}' is not allowed")]
    InvalidSegment { locator: String, segment: String },
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {name}")]
    MissingVariable { name: String },

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("Failed to extract configuration: {message}")]
    Extract { message: String },
}

/// Errors from object storage access.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {locator}")]
    NotFound { locator: String },

    #[error("Failed to access {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the warehouse sink.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Invalid table reference '{table_ref}': expected [project.]dataset.table")]
    InvalidTableRef { table_ref: String },

    #[error("Load job for {table_ref} failed: {message}")]
    LoadFailed { table_ref: String, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Warehouse IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for the mlplatform core.
pub type Result<T> = std::result::Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::Locator(LocatorError::MissingScheme {
            locator: "s3://bucket/key".into(),
            scheme: "gs://".into(),
        });
        assert_eq!(
            err.to_string(),
            "Locator error: Invalid storage locator 's3://bucket/key': expected the 'gs://' scheme"
        );
    }

    #[test]
    fn test_config_error_names_variable() {
        let err = ConfigError::MissingVariable {
            name: "PROJECT_ID".into(),
        };
        assert!(err.to_string().contains("PROJECT_ID"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PlatformError = io_err.into();
        assert!(matches!(err, PlatformError::Io(_)));
    }
}
