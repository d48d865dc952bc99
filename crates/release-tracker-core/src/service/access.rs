//! Read access to releases and their annotations.

use std::sync::Arc;

use tracing::{error, instrument, Instrument};

use release_state::{
    AnnotationKind, AnnotationStore, FullRelease, Outcome, Release, ReleaseId, ReleaseScope,
    ReleaseStore,
};

use crate::config::ServiceConfig;
use crate::fanout::{FanOut, FanOutError};
use crate::model::{ReleaseCreateResponse, ReleaseResponse};
use crate::obs::{self, ReleaseSpan};
use crate::service::{resolve, to_json};
use crate::tick::Tick;

#[derive(Clone)]
pub struct ReleaseAccessService {
    releases: Arc<dyn ReleaseStore>,
    annotations: Arc<dyn AnnotationStore>,
    config: ServiceConfig,
}

impl ReleaseAccessService {
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

    /// The release at `tick` with all of its annotations.
    ///
    /// The five annotations are read concurrently under the configured
    /// deadline. An annotation that was never written is blank.
    pub async fn get(
        &self,
        application: &str,
        environment: &str,
        version: &str,
        tick: &Tick,
    ) -> Outcome<String> {
        let span = ReleaseSpan::span("get", application, environment, version);
        async move {
            let resolved =
                resolve(self.releases.as_ref(), application, environment, version, tick).await;
            let release = match resolved.into_present() {
                Ok(release) => release,
                Err(absent) => return absent,
            };
            self.with_annotations(release)
                .await
                .and_then(|response| to_json(&response))
        }
        .instrument(span)
        .await
    }

    /// Same as [`Self::get`], addressed by surrogate id.
    #[instrument(skip(self), fields(release_id = %id))]
    pub async fn by_id(&self, id: &ReleaseId) -> Outcome<String> {
        match self.releases.find_release_by_id(id).await {
            Outcome::Present(release) => self
                .with_annotations(release)
                .await
                .and_then(|response| to_json(&response)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Error => Outcome::Error,
        }
    }

    /// Every recorded timestamp of `(application, environment, version)`,
    /// oldest first.
    #[instrument(skip(self))]
    pub async fn releases(&self, application: &str, environment: &str, version: &str) -> Outcome<String> {
        self.releases
            .find_releases(application, environment, version)
            .await
            .and_then(|releases| {
                let bodies: Vec<ReleaseCreateResponse> = releases
                    .iter()
                    .map(|r| {
                        ReleaseCreateResponse::new(
                            &r.application,
                            &r.environment,
                            &r.version,
                            Tick::from(r.release_timestamp),
                        )
                    })
                    .collect();
                to_json(&bodies)
            })
    }

    #[instrument(skip(self))]
    pub async fn all(&self) -> Outcome<String> {
        self.all_in(&ReleaseScope::All).await
    }

    #[instrument(skip(self))]
    pub async fn all_by_application(&self, application: &str) -> Outcome<String> {
        self.all_in(&ReleaseScope::Application(application.to_string()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn all_by_application_and_environment(
        &self,
        application: &str,
        environment: &str,
    ) -> Outcome<String> {
        self.all_in(&ReleaseScope::ApplicationEnvironment(
            application.to_string(),
            environment.to_string(),
        ))
        .await
    }

    #[instrument(skip(self))]
    pub async fn current_by_application(&self, application: &str) -> Outcome<String> {
        self.current_in(&ReleaseScope::Application(application.to_string()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn current_by_application_and_environment(
        &self,
        application: &str,
        environment: &str,
    ) -> Outcome<String> {
        self.current_in(&ReleaseScope::ApplicationEnvironment(
            application.to_string(),
            environment.to_string(),
        ))
        .await
    }

    async fn all_in(&self, scope: &ReleaseScope) -> Outcome<String> {
        self.releases.all_releases(scope).await.and_then(|all| {
            let bodies: Vec<ReleaseResponse> = all.iter().map(ReleaseResponse::from).collect();
            to_json(&bodies)
        })
    }

    async fn current_in(&self, scope: &ReleaseScope) -> Outcome<String> {
        self.releases
            .current_release(scope)
            .await
            .and_then(|current: FullRelease| to_json(&ReleaseResponse::from(&current)))
    }

    /// Read all five annotations of `release` concurrently.
    ///
    /// `Error` if the deadline passes or any read fails; a kind with no value
    /// stays blank.
    async fn with_annotations(&self, release: Release) -> Outcome<ReleaseResponse> {
        let mut response = ReleaseResponse::blank(&release);
        let mut group = FanOut::new();
        for kind in AnnotationKind::ALL {
            let store = Arc::clone(&self.annotations);
            let id = release.id.clone();
            let spawned = group.spawn(async move {
                let value = store.get(kind, &id).await;
                (kind, value)
            });
            if let Err(err) = spawned {
                error!(error = %err, "could not schedule annotation read");
                return Outcome::Error;
            }
        }

        let tasks = group.len();
        let report = match group.join(self.config.fanout_timeout).await {
            Ok(report) => report,
            Err(FanOutError::TimedOut { tasks, deadline }) => {
                obs::emit_fanout_timed_out(release.id.as_str(), tasks, deadline);
                return Outcome::Error;
            }
            Err(err) => {
                error!(error = %err, "annotation fan-out failed");
                return Outcome::Error;
            }
        };
        let succeeded = report.results.iter().filter(|(_, v)| !v.is_error()).count();
        obs::emit_fanout_finished(release.id.as_str(), tasks, succeeded, report.elapsed);

        for (kind, value) in report.results {
            match value {
                Outcome::Present(value) => response.set_annotation(kind, value),
                Outcome::Empty => {}
                Outcome::Error => return Outcome::Error,
            }
        }
        Outcome::Present(response)
    }
}
