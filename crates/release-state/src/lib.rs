//! Release-State: SurrealDB persistence for the release tracker
//!
//! This crate owns every round-trip to the store. It records releases keyed by
//! `(application, environment, version, timestamp)` and the five optional
//! annotations a release may carry.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: identity uniqueness, "current release" ordering, and keeping store
//! faults on this side of the boundary.
//!
//! ## Key Components
//!
//! - `Outcome`: tri-state result (present, empty, error) of every store operation
//! - `ReleaseStore` / `AnnotationStore`: the store-access traits
//! - `StoreHandle`: manages the connection and hands out store implementations
//! - `fakes`: in-memory stores with fault injection for tests

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod outcome;
mod schema;
pub mod storage_traits;
mod surreal_annotations;
mod surreal_releases;

pub use error::{StateError, StorageError};
pub use handle::{
    StoreConfig, StoreCredentials, StoreHandle, DEFAULT_DATABASE, DEFAULT_NAMESPACE,
};
pub use outcome::Outcome;
pub use storage_traits::{
    AnnotationKind, AnnotationStore, FullRelease, Release, ReleaseId, ReleaseIdentity,
    ReleaseScope, ReleaseStore,
};
pub use surreal_annotations::SurrealAnnotationStore;
pub use surreal_releases::SurrealReleaseStore;

/// Result type for release-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
