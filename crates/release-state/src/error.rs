//! Error types for release-state

use thiserror::Error;

/// Errors raised while connecting to the store or preparing its schema.
///
/// These surface from setup functions only; per-operation faults are
/// described by [`StorageError`] and collapsed into `Outcome::Error`.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Configuration could not be read
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::SchemaSetup(err.to_string())
    }
}

/// Faults detected during a single store round-trip.
///
/// Never returned across the store boundary: every operation logs the fault
/// once and reports `Outcome::Error` instead.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The statement could not be executed or its result could not be read
    #[error("{operation} failed: {detail}")]
    Backend {
        operation: &'static str,
        detail: String,
    },

    /// A row came back in a shape that cannot be mapped
    #[error("{operation} returned a malformed row: {detail}")]
    MalformedRow {
        operation: &'static str,
        detail: String,
    },
}

impl StorageError {
    pub(crate) fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            operation,
            detail: err.to_string(),
        }
    }

    pub(crate) fn malformed(operation: &'static str, detail: impl Into<String>) -> Self {
        StorageError::MalformedRow {
            operation,
            detail: detail.into(),
        }
    }
}
