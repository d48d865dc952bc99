//! Storage trait definitions for the release tracker
//!
//! These traits define the two store-access seams:
//! - `ReleaseStore`: release identity lookup, insert, and projections
//! - `AnnotationStore`: per-kind upsert/get/delete of optional annotations
//!
//! Every operation returns an [`Outcome`]; store faults are logged where they
//! are detected and never cross this boundary as errors or panics. In-memory
//! fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

// ---------------------------------------------------------------------------
// Release model
// ---------------------------------------------------------------------------

/// Store-assigned surrogate key of a release.
///
/// Opaque to callers. Keys are ULIDs, so they order by creation time and are
/// used as the tie-break when two releases share a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReleaseId(pub String);

impl ReleaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural identity of a release. Unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseIdentity {
    pub application: String,
    pub environment: String,
    pub version: String,
    pub release_timestamp: DateTime<Utc>,
}

impl ReleaseIdentity {
    pub fn new(
        application: impl Into<String>,
        environment: impl Into<String>,
        version: impl Into<String>,
        release_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            application: application.into(),
            environment: environment.into(),
            version: version.into(),
            release_timestamp,
        }
    }
}

/// A stored release.
///
/// `id` and `release_timestamp` never change once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Release {
    pub id: ReleaseId,
    pub application: String,
    pub environment: String,
    pub version: String,
    pub release_timestamp: DateTime<Utc>,
}

impl Release {
    pub fn identity(&self) -> ReleaseIdentity {
        ReleaseIdentity::new(
            &self.application,
            &self.environment,
            &self.version,
            self.release_timestamp,
        )
    }
}

/// A release together with all of its optional annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullRelease {
    pub release: Release,
    pub release_name: Option<String>,
    pub description: Option<String>,
    pub changes: Option<String>,
    pub responsibility: Option<String>,
    pub build_location: Option<String>,
}

impl FullRelease {
    /// A release with no annotations.
    pub fn bare(release: Release) -> Self {
        Self {
            release,
            release_name: None,
            description: None,
            changes: None,
            responsibility: None,
            build_location: None,
        }
    }

    pub fn annotation(&self, kind: AnnotationKind) -> Option<&str> {
        match kind {
            AnnotationKind::ReleaseName => self.release_name.as_deref(),
            AnnotationKind::Description => self.description.as_deref(),
            AnnotationKind::Changes => self.changes.as_deref(),
            AnnotationKind::Responsibility => self.responsibility.as_deref(),
            AnnotationKind::BuildLocation => self.build_location.as_deref(),
        }
    }

    pub fn set_annotation(&mut self, kind: AnnotationKind, value: Option<String>) {
        match kind {
            AnnotationKind::ReleaseName => self.release_name = value,
            AnnotationKind::Description => self.description = value,
            AnnotationKind::Changes => self.changes = value,
            AnnotationKind::Responsibility => self.responsibility = value,
            AnnotationKind::BuildLocation => self.build_location = value,
        }
    }
}

/// Which releases a projection covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseScope {
    All,
    Application(String),
    ApplicationEnvironment(String, String),
}

impl ReleaseScope {
    pub fn matches(&self, release: &Release) -> bool {
        match self {
            ReleaseScope::All => true,
            ReleaseScope::Application(app) => release.application == *app,
            ReleaseScope::ApplicationEnvironment(app, env) => {
                release.application == *app && release.environment == *env
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation model
// ---------------------------------------------------------------------------

/// The five independent optional annotations a release may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationKind {
    ReleaseName,
    Description,
    Changes,
    Responsibility,
    BuildLocation,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 5] = [
        AnnotationKind::ReleaseName,
        AnnotationKind::Description,
        AnnotationKind::Changes,
        AnnotationKind::Responsibility,
        AnnotationKind::BuildLocation,
    ];

    /// Public label, also used as the JSON key of single-annotation bodies.
    pub fn label(self) -> &'static str {
        match self {
            AnnotationKind::ReleaseName => "release-name",
            AnnotationKind::Description => "description",
            AnnotationKind::Changes => "changes",
            AnnotationKind::Responsibility => "responsibility",
            AnnotationKind::BuildLocation => "build-location",
        }
    }

    /// Backing table of this kind.
    pub fn table(self) -> &'static str {
        match self {
            AnnotationKind::ReleaseName => "release_names",
            AnnotationKind::Description => "descriptions",
            AnnotationKind::Changes => "changes",
            AnnotationKind::Responsibility => "responsibilities",
            AnnotationKind::BuildLocation => "build_locations",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Release store access.
///
/// Guarantees:
/// - The identity tuple is unique; `insert_release` on an existing identity
///   reports `Error` (creation is explicit, not an upsert).
/// - Collections are `Empty` only when nothing matched, and are ordered by
///   `(release_timestamp, id)` ascending.
/// - "Current" is the release with the greatest `(release_timestamp, id)`.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Exact-match lookup on the identity tuple.
    async fn find_release(&self, identity: &ReleaseIdentity) -> Outcome<Release>;

    /// Lookup by surrogate id.
    async fn find_release_by_id(&self, id: &ReleaseId) -> Outcome<Release>;

    /// All timestamps recorded for `(application, environment, version)`.
    async fn find_releases(
        &self,
        application: &str,
        environment: &str,
        version: &str,
    ) -> Outcome<Vec<Release>>;

    /// Unconditional insert, returning the assigned id.
    async fn insert_release(&self, identity: &ReleaseIdentity) -> Outcome<ReleaseId>;

    /// Latest release in scope, joined with its annotations.
    async fn current_release(&self, scope: &ReleaseScope) -> Outcome<FullRelease>;

    /// Every release in scope, joined with its annotations.
    async fn all_releases(&self, scope: &ReleaseScope) -> Outcome<Vec<FullRelease>>;
}

/// Optional-annotation store access.
///
/// Each kind is an independent one-to-one relation keyed by release id, so
/// operations on different kinds never contend with each other.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Insert or replace the value; `true` if exactly one row was written.
    async fn upsert(&self, kind: AnnotationKind, release_id: &ReleaseId, value: &str) -> bool;

    /// Current value, or `Empty` if this kind was never written.
    async fn get(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<String>;

    /// Remove the value; `Empty` if there was nothing to delete.
    async fn delete(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<bool>;
}
