//! # mlplatform-core
//!
//! Shared plumbing for the mlplatform pipeline stages: configuration,
//! storage locators, the object storage and warehouse seams, and atomic
//! file persistence.

pub mod config;
pub mod error;
pub mod locator;
pub mod persistence;
pub mod storage;
pub mod warehouse;

pub use config::{PlatformConfig, load_config};
pub use error::{ConfigError, LocatorError, PlatformError, Result, StorageError, WarehouseError};
pub use locator::StorageLocator;
pub use storage::{FsObjectStore, ObjectStore};
pub use warehouse::{FieldType, FieldValue, LoadJob, SchemaField, SqliteWarehouse, TableRef, Warehouse};
