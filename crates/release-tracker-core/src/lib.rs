//! Release Tracker Core Library
//!
//! Creation and resolution of releases, annotation fan-out, and read access.
//! Persistence lives in `release-state`; this crate orchestrates it.

pub mod config;
pub mod error;
pub mod fanout;
pub mod model;
pub mod obs;
pub mod sanitize;
pub mod service;
pub mod telemetry;
pub mod tick;

pub use config::{ConflictPolicy, ServiceConfig};
pub use error::{Result, TrackerError};
pub use fanout::{FanOut, FanOutError, FanOutReport};
pub use model::{OptionalInformation, ReleaseCreateResponse, ReleaseResponse};
pub use service::{
    CreateOrUpdate, ReleaseAccessService, ReleaseAnnotationService, ReleaseCreationService,
    ReleaseTracker,
};
pub use tick::Tick;

pub use release_state::{
    AnnotationKind, AnnotationStore, Outcome, ReleaseId, ReleaseStore, StoreConfig, StoreHandle,
};
