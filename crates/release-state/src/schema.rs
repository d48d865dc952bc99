//! Row shapes for the release tracker SurrealDB tables
//!
//! Tables:
//! - releases: identity tuple plus store-assigned ULID key
//! - release_names, descriptions, changes, responsibilities, build_locations:
//!   one optional annotation per release, keyed by the release key
//!
//! Rows are converted to/from `storage_traits` types at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime as SurrealDatetime;

use crate::error::StorageError;
use crate::storage_traits::{FullRelease, Release, ReleaseId};

/// Projection of a `releases` row with its key flattened to a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReleaseRow {
    pub id: String,
    pub application: String,
    pub environment: String,
    pub version: String,
    pub release_timestamp: SurrealDatetime,
}

impl ReleaseRow {
    pub fn into_release(self, operation: &'static str) -> Result<Release, StorageError> {
        if self.id.is_empty() {
            return Err(StorageError::malformed(operation, "release row without id"));
        }
        Ok(Release {
            id: ReleaseId(self.id),
            application: self.application,
            environment: self.environment,
            version: self.version,
            release_timestamp: DateTime::<Utc>::from(self.release_timestamp),
        })
    }
}

/// A `releases` row left-joined with every annotation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FullReleaseRow {
    pub id: String,
    pub application: String,
    pub environment: String,
    pub version: String,
    pub release_timestamp: SurrealDatetime,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub changes: Option<String>,
    #[serde(default)]
    pub responsibility: Option<String>,
    #[serde(default)]
    pub build_location: Option<String>,
}

impl FullReleaseRow {
    pub fn into_full_release(self, operation: &'static str) -> Result<FullRelease, StorageError> {
        let release = ReleaseRow {
            id: self.id,
            application: self.application,
            environment: self.environment,
            version: self.version,
            release_timestamp: self.release_timestamp,
        }
        .into_release(operation)?;

        Ok(FullRelease {
            release,
            release_name: self.release_name,
            description: self.description,
            changes: self.changes,
            responsibility: self.responsibility,
            build_location: self.build_location,
        })
    }
}

/// A row of any annotation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnnotationRow {
    pub release_id: String,
    pub value: String,
}
