//! Single-annotation reads and deletes.

use std::sync::Arc;

use tracing::Instrument;

use release_state::{AnnotationKind, AnnotationStore, Outcome, ReleaseStore};

use crate::model::annotation_json;
use crate::obs::ReleaseSpan;
use crate::service::{resolve, to_json};
use crate::tick::Tick;

#[derive(Clone)]
pub struct ReleaseAnnotationService {
    releases: Arc<dyn ReleaseStore>,
    annotations: Arc<dyn AnnotationStore>,
}

impl ReleaseAnnotationService {
    pub fn new(releases: Arc<dyn ReleaseStore>, annotations: Arc<dyn AnnotationStore>) -> Self {
        Self {
            releases,
            annotations,
        }
    }

    /// `{"<label>": "<value>"}` for one annotation of the release at `tick`.
    ///
    /// `Empty` if either the release or the annotation does not exist.
    pub async fn annotation(
        &self,
        application: &str,
        environment: &str,
        version: &str,
        tick: &Tick,
        kind: AnnotationKind,
    ) -> Outcome<String> {
        let span = ReleaseSpan::span("annotation", application, environment, version);
        async move {
            let resolved =
                resolve(self.releases.as_ref(), application, environment, version, tick).await;
            let release = match resolved.into_present() {
                Ok(release) => release,
                Err(absent) => return absent,
            };
            self.annotations
                .get(kind, &release.id)
                .await
                .and_then(|value| to_json(&annotation_json(kind, &value)))
        }
        .instrument(span)
        .await
    }

    /// Remove one annotation of the release at `tick`.
    ///
    /// `Empty` if either the release or the annotation does not exist.
    pub async fn delete_annotation(
        &self,
        application: &str,
        environment: &str,
        version: &str,
        tick: &Tick,
        kind: AnnotationKind,
    ) -> Outcome<bool> {
        let span = ReleaseSpan::span("delete_annotation", application, environment, version);
        async move {
            match resolve(self.releases.as_ref(), application, environment, version, tick).await {
                Outcome::Present(release) => self.annotations.delete(kind, &release.id).await,
                Outcome::Empty => Outcome::Empty,
                Outcome::Error => Outcome::Error,
            }
        }
        .instrument(span)
        .await
    }
}
