//! Structured observability hooks for release tracker operations.
//!
//! This module provides:
//! - Operation-scoped tracing spans via the `ReleaseSpan` RAII guard
//! - Emission functions for key events: release created, release resolved,
//!   annotation fan-out finished, fan-out timed out
//!
//! Events are emitted at `info!` level, timeouts at `warn!`.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::tick::Tick;

/// RAII guard that enters an operation span tagged with a fresh `op_id`.
///
/// Only for synchronous sections; async code attaches
/// [`ReleaseSpan::span`] with `tracing::Instrument` instead.
///
/// # Example
///
/// ```ignore
/// let _span = ReleaseSpan::enter("create", "svc", "prod", "1.2.0");
/// // every event below carries op_id, operation and the release tuple
/// ```
pub struct ReleaseSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReleaseSpan {
    pub fn enter(operation: &'static str, application: &str, environment: &str, version: &str) -> Self {
        Self {
            _span: Self::span(operation, application, environment, version).entered(),
        }
    }

    /// The span without entering it.
    pub fn span(
        operation: &'static str,
        application: &str,
        environment: &str,
        version: &str,
    ) -> tracing::Span {
        tracing::info_span!(
            "release_tracker.op",
            op_id = %Uuid::new_v4(),
            operation,
            application = %application,
            environment = %environment,
            version = %version,
        )
    }
}

/// Emit event: a release row was inserted.
pub fn emit_release_created(release_id: &str, tick: &Tick) {
    info!(event = "release.created", release_id = %release_id, tick = %tick);
}

/// Emit event: create-or-update resolved an existing or new release.
pub fn emit_release_resolved(release_id: &str, created: bool) {
    info!(event = "release.resolved", release_id = %release_id, created = created);
}

/// Emit event: an annotation fan-out joined all of its tasks.
pub fn emit_fanout_finished(release_id: &str, tasks: usize, succeeded: usize, elapsed: Duration) {
    info!(
        event = "fanout.finished",
        release_id = %release_id,
        tasks = tasks,
        succeeded = succeeded,
        elapsed_ms = elapsed.as_millis() as u64,
    );
}

/// Emit event: an annotation fan-out missed its deadline (warning level).
pub fn emit_fanout_timed_out(release_id: &str, tasks: usize, deadline: Duration) {
    warn!(
        event = "fanout.timed_out",
        release_id = %release_id,
        tasks = tasks,
        deadline_ms = deadline.as_millis() as u64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_span_create() {
        let _span = ReleaseSpan::enter("get", "svc", "prod", "1.2.0");
        emit_release_resolved("01J0", false);
    }
}
