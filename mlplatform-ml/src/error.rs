//! Error types for the mlplatform-ml crate.

use mlplatform_core::error::{ConfigError, LocatorError, PlatformError, WarehouseError};
use thiserror::Error;

/// Top-level error type for pipeline stages and models.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Deployment error: {0}")]
    Deployment(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Unknown candidate model '{name}' (known: {known})")]
    UnknownCandidate { name: String, known: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MlError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn deployment(msg: impl Into<String>) -> Self {
        Self::Deployment(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<LocatorError> for MlError {
    fn from(err: LocatorError) -> Self {
        Self::Platform(err.into())
    }
}

impl From<ConfigError> for MlError {
    fn from(err: ConfigError) -> Self {
        Self::Platform(err.into())
    }
}

impl From<WarehouseError> for MlError {
    fn from(err: WarehouseError) -> Self {
        Self::Platform(err.into())
    }
}

pub type Result<T> = std::result::Result<T, MlError>;
