//! Request and response bodies.

use serde::{Deserialize, Serialize};

use release_state::{AnnotationKind, FullRelease, Release};

use crate::error::TrackerError;
use crate::tick::Tick;

/// Body returned when a release is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCreateResponse {
    pub application: String,
    pub environment: String,
    pub version: String,
    pub zulu_epoch_nanos: Tick,
}

impl ReleaseCreateResponse {
    pub fn new(
        application: impl Into<String>,
        environment: impl Into<String>,
        version: impl Into<String>,
        tick: Tick,
    ) -> Self {
        Self {
            application: application.into(),
            environment: environment.into(),
            version: version.into(),
            zulu_epoch_nanos: tick,
        }
    }
}

/// A release with every annotation; absent annotations are blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub application: String,
    pub environment: String,
    pub version: String,
    pub zulu_epoch_nanos: Tick,
    pub release_name: String,
    pub description: String,
    pub changes: String,
    pub responsibility: String,
    pub build_location: String,
}

impl ReleaseResponse {
    /// A release with blank annotations, to be filled with [`Self::set_annotation`].
    pub fn blank(release: &Release) -> Self {
        Self {
            application: release.application.clone(),
            environment: release.environment.clone(),
            version: release.version.clone(),
            zulu_epoch_nanos: Tick::from(release.release_timestamp),
            release_name: String::new(),
            description: String::new(),
            changes: String::new(),
            responsibility: String::new(),
            build_location: String::new(),
        }
    }

    pub fn set_annotation(&mut self, kind: AnnotationKind, value: String) {
        let slot = match kind {
            AnnotationKind::ReleaseName => &mut self.release_name,
            AnnotationKind::Description => &mut self.description,
            AnnotationKind::Changes => &mut self.changes,
            AnnotationKind::Responsibility => &mut self.responsibility,
            AnnotationKind::BuildLocation => &mut self.build_location,
        };
        *slot = value;
    }
}

impl From<&FullRelease> for ReleaseResponse {
    fn from(full: &FullRelease) -> Self {
        let mut response = Self::blank(&full.release);
        for kind in AnnotationKind::ALL {
            if let Some(value) = full.annotation(kind) {
                response.set_annotation(kind, value.to_string());
            }
        }
        response
    }
}

/// Optional-information payload of create-or-update. Every field may be
/// omitted or `null`; unknown fields are ignored. Parse it with
/// [`OptionalInformation::from_payload`], which only accepts an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalInformation {
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

impl OptionalInformation {
    /// Parse a request payload.
    ///
    /// A blank payload or JSON `null` carries no information (`None`). Any
    /// other value must be a JSON object.
    pub fn from_payload(payload: &str) -> Result<Option<Self>, TrackerError> {
        if payload.trim().is_empty() {
            return Ok(None);
        }
        let object: Option<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(payload)?;
        match object {
            Some(object) => Ok(Some(serde_json::from_value(serde_json::Value::Object(object))?)),
            None => Ok(None),
        }
    }

    pub fn all_null(&self) -> bool {
        self.entries().next().is_none()
    }

    /// The non-null fields, by kind, in [`AnnotationKind::ALL`] order.
    pub fn entries(&self) -> impl Iterator<Item = (AnnotationKind, &str)> + '_ {
        AnnotationKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|value| (kind, value)))
    }

    pub fn get(&self, kind: AnnotationKind) -> Option<&str> {
        match kind {
            AnnotationKind::ReleaseName => self.release_name.as_deref(),
            AnnotationKind::Description => self.description.as_deref(),
            AnnotationKind::Changes => self.changes.as_deref(),
            AnnotationKind::Responsibility => self.responsibility.as_deref(),
            AnnotationKind::BuildLocation => self.build_location.as_deref(),
        }
    }
}

/// `{"<label>": "<value>"}` body of a single annotation.
pub fn annotation_json(kind: AnnotationKind, value: &str) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(kind.label().to_string(), serde_json::Value::from(value));
    serde_json::Value::Object(body)
}
