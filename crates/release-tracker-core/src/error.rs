//! Error taxonomy for the release tracker services.
//!
//! Service operations report absence and store failure through
//! [`release_state::Outcome`]. These errors cover what happens before or
//! around them: configuration, malformed request payloads and unusable ticks.

/// Release tracker errors.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("optional information payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid tick: {0}")]
    InvalidTick(String),
}

/// Result type for release tracker setup operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
