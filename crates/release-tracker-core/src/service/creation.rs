//! Release creation and the create-or-update protocol.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn, Instrument};

use release_state::{
    AnnotationKind, AnnotationStore, Outcome, ReleaseId, ReleaseIdentity, ReleaseStore,
};

use crate::config::{ConflictPolicy, ServiceConfig};
use crate::error::TrackerError;
use crate::fanout::{FanOut, FanOutError};
use crate::model::{OptionalInformation, ReleaseCreateResponse};
use crate::obs::{self, ReleaseSpan};
use crate::sanitize;
use crate::service::to_json;
use crate::tick::Tick;

/// Result of [`ReleaseCreationService::create_or_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrUpdate {
    /// Creation body when the release was created, blank when it already existed.
    pub json: String,
    pub created: bool,
}

#[derive(Clone)]
pub struct ReleaseCreationService {
    releases: Arc<dyn ReleaseStore>,
    annotations: Arc<dyn AnnotationStore>,
    config: ServiceConfig,
}

impl ReleaseCreationService {
    pub fn new(
        releases: Arc<dyn ReleaseStore>,
        annotations: Arc<dyn AnnotationStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            releases,
            annotations,
            config,
        }
    }

    /// Record a release of `version` happening now.
    pub async fn create(&self, application: &str, environment: &str, version: &str) -> Outcome<String> {
        let span = ReleaseSpan::span("create", application, environment, version);
        async move {
            let identity = ReleaseIdentity::new(application, environment, version, Utc::now());
            self.insert(&identity).await.map(|(_, json)| json)
        }
        .instrument(span)
        .await
    }

    /// Resolve the release at `tick`, creating it if needed, then write the
    /// annotations carried by `payload`.
    ///
    /// Every valid annotation is upserted concurrently under the configured
    /// deadline. A missed deadline, or any upsert that fails, fails the whole
    /// call even though the release itself may have been created.
    pub async fn create_or_update(
        &self,
        application: &str,
        environment: &str,
        version: &str,
        tick: &Tick,
        payload: &str,
    ) -> Outcome<CreateOrUpdate> {
        let span = ReleaseSpan::span("create_or_update", application, environment, version);
        async move {
            let Some(instant) = tick.to_datetime() else {
                let err = TrackerError::InvalidTick(tick.to_string());
                error!(error = %err, "tick outside the representable range");
                return Outcome::Error;
            };
            let identity = ReleaseIdentity::new(application, environment, version, instant);

            let (release_id, json, created) = match self.resolve_or_create(&identity).await {
                Outcome::Present(resolved) => resolved,
                Outcome::Empty | Outcome::Error => return Outcome::Error,
            };
            obs::emit_release_resolved(release_id.as_str(), created);
            let done = CreateOrUpdate { json, created };

            let info = match OptionalInformation::from_payload(payload) {
                Ok(Some(info)) if !info.all_null() => info,
                Ok(_) => return Outcome::Present(done),
                Err(err) => {
                    error!(error = %err, "rejected optional information payload");
                    return Outcome::Error;
                }
            };

            if self.write_annotations(&release_id, &info).await {
                Outcome::Present(done)
            } else {
                Outcome::Error
            }
        }
        .instrument(span)
        .await
    }

    async fn insert(&self, identity: &ReleaseIdentity) -> Outcome<(ReleaseId, String)> {
        let id = match self.releases.insert_release(identity).await {
            Outcome::Present(id) => id,
            Outcome::Empty | Outcome::Error => return Outcome::Error,
        };
        let tick = Tick::from(identity.release_timestamp);
        obs::emit_release_created(id.as_str(), &tick);

        let body = ReleaseCreateResponse::new(
            &identity.application,
            &identity.environment,
            &identity.version,
            tick,
        );
        to_json(&body).map(|json| (id, json))
    }

    /// `(id, creation body or "", created)` for the release with `identity`.
    async fn resolve_or_create(
        &self,
        identity: &ReleaseIdentity,
    ) -> Outcome<(ReleaseId, String, bool)> {
        match self.releases.find_release(identity).await {
            Outcome::Present(release) => {
                return Outcome::Present((release.id, String::new(), false));
            }
            Outcome::Error => return Outcome::Error,
            Outcome::Empty => {}
        }

        match self.insert(identity).await {
            Outcome::Present((id, json)) => Outcome::Present((id, json, true)),
            _ => self.after_failed_insert(identity).await,
        }
    }

    async fn after_failed_insert(
        &self,
        identity: &ReleaseIdentity,
    ) -> Outcome<(ReleaseId, String, bool)> {
        if self.config.conflict_policy == ConflictPolicy::Fail {
            return Outcome::Error;
        }
        match self.releases.find_release(identity).await {
            Outcome::Present(release) => {
                warn!(
                    release_id = %release.id,
                    "release was inserted concurrently; continuing as update"
                );
                Outcome::Present((release.id, String::new(), false))
            }
            _ => Outcome::Error,
        }
    }

    /// Upsert every sanitized annotation of `info` concurrently. `true` only
    /// if all of them were written before the deadline.
    async fn write_annotations(&self, release_id: &ReleaseId, info: &OptionalInformation) -> bool {
        let mut group = FanOut::new();
        for (kind, value) in info.entries() {
            let Some(value) = sanitized(kind, value) else {
                warn!(%kind, "annotation value rejected by sanitization; skipped");
                continue;
            };
            let store = Arc::clone(&self.annotations);
            let id = release_id.clone();
            let value = value.to_string();
            let spawned = group.spawn(async move {
                let written = store.upsert(kind, &id, &value).await;
                (kind, written)
            });
            if let Err(err) = spawned {
                error!(error = %err, "could not schedule annotation upsert");
                return false;
            }
        }

        let tasks = group.len();
        if tasks == 0 {
            debug!("no annotation passed sanitization");
            return true;
        }

        let deadline = self.config.fanout_timeout;
        match group.join(deadline).await {
            Ok(report) => {
                let failed: Vec<AnnotationKind> = report
                    .results
                    .iter()
                    .filter(|(_, written)| !written)
                    .map(|(kind, _)| *kind)
                    .collect();
                obs::emit_fanout_finished(
                    release_id.as_str(),
                    tasks,
                    tasks - failed.len(),
                    report.elapsed,
                );
                if !failed.is_empty() {
                    error!(?failed, "annotation upserts failed");
                }
                failed.is_empty()
            }
            Err(FanOutError::TimedOut { tasks, deadline }) => {
                obs::emit_fanout_timed_out(release_id.as_str(), tasks, deadline);
                false
            }
            Err(err) => {
                error!(error = %err, "annotation fan-out failed");
                false
            }
        }
    }
}

/// Release names are identifiers; every other annotation is free text.
fn sanitized(kind: AnnotationKind, value: &str) -> Option<&str> {
    match kind {
        AnnotationKind::ReleaseName => sanitize::safe_string(value),
        _ => sanitize::safe_text(value),
    }
}
