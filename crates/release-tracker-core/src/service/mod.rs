//! Release services: creation and resolution, read access, single annotations.
//!
//! Services take plain strings and a [`Tick`] and answer with an [`Outcome`]
//! holding a JSON body. They never return store faults as errors: a fault was
//! logged where it was detected and arrives here as `Outcome::Error`.

mod access;
mod annotation;
mod creation;

pub use access::ReleaseAccessService;
pub use annotation::ReleaseAnnotationService;
pub use creation::{CreateOrUpdate, ReleaseCreationService};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use release_state::{
    AnnotationStore, Outcome, Release, ReleaseIdentity, ReleaseStore, StoreHandle,
};

use crate::config::ServiceConfig;
use crate::tick::Tick;

/// All three services over one pair of stores.
#[derive(Clone)]
pub struct ReleaseTracker {
    pub creation: ReleaseCreationService,
    pub access: ReleaseAccessService,
    pub annotations: ReleaseAnnotationService,
}

impl ReleaseTracker {
    pub fn new(
        releases: Arc<dyn ReleaseStore>,
        annotations: Arc<dyn AnnotationStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            creation: ReleaseCreationService::new(
                Arc::clone(&releases),
                Arc::clone(&annotations),
                config.clone(),
            ),
            access: ReleaseAccessService::new(
                Arc::clone(&releases),
                Arc::clone(&annotations),
                config,
            ),
            annotations: ReleaseAnnotationService::new(releases, annotations),
        }
    }

    /// Services backed by the SurrealDB stores of `handle`.
    pub fn from_handle(handle: &StoreHandle, config: ServiceConfig) -> Self {
        Self::new(
            Arc::new(handle.release_store()),
            Arc::new(handle.annotation_store()),
            config,
        )
    }
}

/// Look a release up by its identity tuple.
///
/// A tick that names no representable instant cannot match any release and
/// is reported as `Empty`.
pub(crate) async fn resolve(
    releases: &dyn ReleaseStore,
    application: &str,
    environment: &str,
    version: &str,
    tick: &Tick,
) -> Outcome<Release> {
    let Some(instant) = tick.to_datetime() else {
        debug!(%tick, "tick outside the representable range");
        return Outcome::Empty;
    };
    let identity = ReleaseIdentity::new(application, environment, version, instant);
    releases.find_release(&identity).await
}

pub(crate) fn to_json<T: Serialize + ?Sized>(body: &T) -> Outcome<String> {
    match serde_json::to_string(body) {
        Ok(json) => Outcome::Present(json),
        Err(err) => {
            error!(error = %err, "failed to encode response body");
            Outcome::Error
        }
    }
}
