//! Service configuration.

use std::time::Duration;

use crate::error::{Result, TrackerError};

pub const DEFAULT_FANOUT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 255;

/// What create-or-update does when its insert fails after the lookup found
/// nothing, typically because a concurrent call inserted the same release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Look the release up once more and continue as an update if it exists.
    #[default]
    Refetch,
    /// Report the failed insert as `Error`.
    Fail,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "refetch" => Ok(ConflictPolicy::Refetch),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(TrackerError::Config(format!(
                "unknown conflict policy '{other}' (expected refetch or fail)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Shared deadline for one annotation fan-out.
    pub fanout_timeout: Duration,
    /// Longest accepted application/environment/version identifier.
    pub max_identifier_len: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            fanout_timeout: DEFAULT_FANOUT_TIMEOUT,
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl ServiceConfig {
    pub fn with_fanout_timeout(mut self, timeout: Duration) -> Self {
        self.fanout_timeout = timeout;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - RELEASE_TRACKER_FANOUT_TIMEOUT_SECS (optional, default: 30)
    /// - RELEASE_TRACKER_MAX_IDENTIFIER_LEN (optional, default: 255)
    /// - RELEASE_TRACKER_CONFLICT_POLICY (optional, `refetch` or `fail`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RELEASE_TRACKER_FANOUT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                TrackerError::Config(format!(
                    "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS must be a whole number, got '{raw}'"
                ))
            })?;
            if secs == 0 {
                return Err(TrackerError::Config(
                    "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS must be positive".to_string(),
                ));
            }
            config.fanout_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("RELEASE_TRACKER_MAX_IDENTIFIER_LEN") {
            config.max_identifier_len = raw.trim().parse().map_err(|_| {
                TrackerError::Config(format!(
                    "RELEASE_TRACKER_MAX_IDENTIFIER_LEN must be a whole number, got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup("RELEASE_TRACKER_CONFLICT_POLICY") {
            config.conflict_policy = raw.parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.fanout_timeout, Duration::from_secs(30));
        assert_eq!(config.max_identifier_len, 255);
        assert_eq!(config.conflict_policy, ConflictPolicy::Refetch);
    }

    #[test]
    fn reads_overrides() {
        let config = ServiceConfig::from_lookup(|key| match key {
            "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS" => Some("5".to_string()),
            "RELEASE_TRACKER_MAX_IDENTIFIER_LEN" => Some("64".to_string()),
            "RELEASE_TRACKER_CONFLICT_POLICY" => Some("FAIL".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.fanout_timeout, Duration::from_secs(5));
        assert_eq!(config.max_identifier_len, 64);
        assert_eq!(config.conflict_policy, ConflictPolicy::Fail);
    }

    #[test]
    fn rejects_zero_and_garbage_timeouts() {
        for raw in ["0", "soon"] {
            let err = ServiceConfig::from_lookup(|key| {
                (key == "RELEASE_TRACKER_FANOUT_TIMEOUT_SECS").then(|| raw.to_string())
            })
            .unwrap_err();
            assert!(matches!(err, TrackerError::Config(_)));
        }
    }
}
