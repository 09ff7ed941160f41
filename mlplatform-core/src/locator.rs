//! Object-storage locators (`gs://<bucket>/<object>`).
//!
//! Locators are validated before any storage access is attempted, so a
//! malformed string never reaches a backend.

use crate::error::LocatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheme prefix every locator must carry.
pub const GCS_SCHEME: &str = "gs://";

/// A storage object addressed by bucket and object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageLocator {
    bucket: String,
    object: String,
}

impl StorageLocator {
    /// Parse a `gs://bucket/object` string.
    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let rest = locator
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| LocatorError::MissingScheme {
                locator: locator.to_string(),
                scheme: GCS_SCHEME.to_string(),
            })?;
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| LocatorError::MissingPath {
                locator: locator.to_string(),
            })?;
        if bucket.is_empty() {
            return Err(LocatorError::EmptyBucket {
                locator: locator.to_string(),
            });
        }
        if object.is_empty() {
            return Err(LocatorError::EmptyObject {
                locator: locator.to_string(),
            });
        }
        // Objects map onto local paths, so every segment must be a plain name.
        let invalid = std::iter::once(bucket)
            .chain(object.split('/'))
            .find(|segment| matches!(*segment, "" | "." | ".."));
        if let Some(segment) = invalid {
            return Err(LocatorError::InvalidSegment {
                locator: locator.to_string(),
                segment: segment.to_string(),
            });
        }
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    /// Build a locator from already-split parts.
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Result<Self, LocatorError> {
        Self::parse(&format!("{GCS_SCHEME}{}/{}", bucket.into(), object.into()))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Final path segment of the object, e.g. `data.csv`.
    pub fn file_name(&self) -> &str {
        self.object.rsplit('/').next().unwrap_or(&self.object)
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{GCS_SCHEME}{}/{}", self.bucket, self.object)
    }
}

impl FromStr for StorageLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StorageLocator {
    type Error = LocatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageLocator> for String {
    fn from(locator: StorageLocator) -> Self {
        locator.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let loc = StorageLocator::parse("gs://ml-data/pets/adoption.csv").unwrap();
        assert_eq!(loc.bucket(), "ml-data");
        assert_eq!(loc.object(), "pets/adoption.csv");
        assert_eq!(loc.file_name(), "adoption.csv");
        assert_eq!(loc.to_string(), "gs://ml-data/pets/adoption.csv");
    }

    #[test]
    fn test_missing_scheme() {
        let err = StorageLocator::parse("ml-data/pets.csv").unwrap_err();
        assert!(matches!(err, LocatorError::MissingScheme { .. }));

        let err = StorageLocator::parse("s3://ml-data/pets.csv").unwrap_err();
        assert!(matches!(err, LocatorError::MissingScheme { .. }));
    }

    #[test]
    fn test_missing_path_separator() {
        let err = StorageLocator::parse("gs://ml-data").unwrap_err();
        assert_eq!(
            err,
            LocatorError::MissingPath {
                locator: "gs://ml-data".into()
            }
        );
    }

    #[test]
    fn test_empty_parts() {
        assert!(matches!(
            StorageLocator::parse("gs:///object.csv").unwrap_err(),
            LocatorError::EmptyBucket { .. }
        ));
        assert!(matches!(
            StorageLocator::parse("gs://bucket/").unwrap_err(),
            LocatorError::EmptyObject { .. }
        ));
    }

    #[test]
    fn test_rejects_relative_segments() {
        for raw in [
            "gs://pets/../../escaped.csv",
            "gs://pets/raw/./adoption.csv",
            "gs://pets/raw//adoption.csv",
            "gs://pets/raw/",
            "gs://../adoption.csv",
        ] {
            assert!(
                matches!(
                    StorageLocator::parse(raw).unwrap_err(),
                    LocatorError::InvalidSegment { .. }
                ),
                "{raw}"
            );
        }
        // Dots inside a name are fine.
        assert!(StorageLocator::parse("gs://pets/raw/..adoption.v2.csv").is_ok());
    }

    #[test]
    fn test_serde_as_string() {
        let loc = StorageLocator::parse("gs://b/models/model.joblib").unwrap();
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, "\"gs://b/models/model.joblib\"");
        let bad: Result<StorageLocator, _> = serde_json::from_str("\"b/models\"");
        assert!(bad.is_err());
    }
}
