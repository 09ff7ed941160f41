//! Object storage seam.
//!
//! Stages address objects through [`StorageLocator`]s and never touch a
//! backend before the locator has been validated. [`FsObjectStore`] keeps
//! each bucket as a directory under a local root.

use crate::error::{PlatformError, StorageError};
use crate::locator::StorageLocator;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for reading and writing storage objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full contents of an object.
    async fn get(&self, locator: &StorageLocator) -> Result<Vec<u8>, PlatformError>;

    /// Create or replace an object.
    async fn put(&self, locator: &StorageLocator, data: &[u8]) -> Result<(), PlatformError>;

    /// Whether an object exists.
    async fn exists(&self, locator: &StorageLocator) -> Result<bool, PlatformError>;

    /// Download an object into a local file.
    async fn download_to_file(
        &self,
        locator: &StorageLocator,
        path: &Path,
    ) -> Result<(), PlatformError> {
        let data = self.get(locator).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;
        tracing::debug!(%locator, path = %path.display(), bytes = data.len(), "Downloaded object");
        Ok(())
    }

    /// Upload a local file as an object.
    async fn upload_file(&self, path: &Path, locator: &StorageLocator) -> Result<(), PlatformError> {
        let data = tokio::fs::read(path).await?;
        self.put(locator, &data).await
    }
}

/// Object store backed by a local directory (`<root>/<bucket>/<object>`).
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path an object maps to.
    pub fn object_path(&self, locator: &StorageLocator) -> PathBuf {
        let mut path = self.root.join(locator.bucket());
        for segment in locator.object().split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, locator: &StorageLocator) -> Result<Vec<u8>, PlatformError> {
        let path = self.object_path(locator);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                locator: locator.to_string(),
            }
            .into()),
            Err(source) => Err(StorageError::Access { path, source }.into()),
        }
    }

    async fn put(&self, locator: &StorageLocator, data: &[u8]) -> Result<(), PlatformError> {
        let path = self.object_path(locator);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Access {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| StorageError::Access {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(%locator, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn exists(&self, locator: &StorageLocator) -> Result<bool, PlatformError> {
        Ok(tokio::fs::try_exists(self.object_path(locator)).await?)
    }
}
