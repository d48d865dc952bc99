//! Bounded task group joined under a single deadline.
//!
//! A [`FanOut`] spawns at most [`MAX_TASKS`] tokio tasks, one per annotation
//! kind, and joins them with one shared deadline. Either every task finishes
//! in time and all results are returned, or the whole group fails: results of
//! tasks that did finish are never handed out as a partial success.
//!
//! Dropping the group (including on timeout) aborts tasks that are still
//! running. An abort only takes effect at the task's next await point, so a
//! store call already in flight may still complete; its result is discarded.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, Instrument};

use release_state::AnnotationKind;

/// One task per annotation kind.
pub const MAX_TASKS: usize = AnnotationKind::ALL.len();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FanOutError {
    #[error("fan-out already holds {limit} tasks")]
    Full { limit: usize },

    #[error("fan-out of {tasks} tasks exceeded its {deadline:?} deadline")]
    TimedOut { tasks: usize, deadline: Duration },

    #[error("fan-out task failed: {0}")]
    TaskFailed(String),
}

/// Joined results plus how long the join took.
#[derive(Debug)]
pub struct FanOutReport<T> {
    pub results: Vec<T>,
    pub elapsed: Duration,
}

pub struct FanOut<T> {
    tasks: JoinSet<T>,
    limit: usize,
}

impl<T: Send + 'static> Default for FanOut<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> FanOut<T> {
    pub fn new() -> Self {
        Self::with_limit(MAX_TASKS)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start `task` now, inside the caller's current span.
    pub fn spawn<F>(&mut self, task: F) -> Result<(), FanOutError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.tasks.len() >= self.limit {
            return Err(FanOutError::Full { limit: self.limit });
        }
        self.tasks.spawn(task.instrument(tracing::Span::current()));
        Ok(())
    }

    /// Wait for every task, or fail once `deadline` has elapsed.
    ///
    /// Results arrive in completion order. A panicking task fails the group.
    pub async fn join(self, deadline: Duration) -> Result<FanOutReport<T>, FanOutError> {
        let started = Instant::now();
        let task_count = self.tasks.len();
        let mut tasks = self.tasks;

        let joined = tokio::time::timeout(deadline, async move {
            let mut results = Vec::with_capacity(task_count);
            while let Some(joined) = tasks.join_next().await {
                let value = joined.map_err(|e| {
                    error!(error = %e, "fan-out task join error");
                    FanOutError::TaskFailed(e.to_string())
                })?;
                results.push(value);
            }
            Ok(results)
        })
        .await;

        match joined {
            Ok(Ok(results)) => {
                let elapsed = started.elapsed();
                debug!(tasks = task_count, ?elapsed, "fan-out joined");
                Ok(FanOutReport { results, elapsed })
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(FanOutError::TimedOut {
                tasks: task_count,
                deadline,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn joins_all_results() {
        let mut group = FanOut::new();
        for i in 0..5u32 {
            group.spawn(async move { i * 2 }).unwrap();
        }
        let mut results = group.join(Duration::from_secs(1)).await.unwrap().results;
        results.sort_unstable();
        assert_eq!(results, vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn empty_group_joins_immediately() {
        let group: FanOut<()> = FanOut::new();
        assert!(group.is_empty());
        let report = group.join(Duration::from_millis(1)).await.unwrap();
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn refuses_more_than_limit() {
        let mut group = FanOut::new();
        for _ in 0..MAX_TASKS {
            group.spawn(async {}).unwrap();
        }
        assert_eq!(
            group.spawn(async {}),
            Err(FanOutError::Full { limit: MAX_TASKS })
        );
        assert_eq!(group.len(), MAX_TASKS);
    }

    #[tokio::test(start_paused = true)]
    async fn one_stuck_task_fails_the_group() {
        let mut group = FanOut::new();
        group.spawn(async { 1 }).unwrap();
        group
            .spawn(async {
                std::future::pending::<()>().await;
                2
            })
            .unwrap();

        let err = group.join(Duration::from_secs(30)).await.unwrap_err();
        assert_eq!(
            err,
            FanOutError::TimedOut {
                tasks: 2,
                deadline: Duration::from_secs(30)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts_outstanding_tasks() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let mut group = FanOut::new();
        group
            .spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert!(group.join(Duration::from_secs(1)).await.is_err());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_task_fails_the_group() {
        let mut group: FanOut<u8> = FanOut::new();
        group
            .spawn(async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                0
            })
            .unwrap();
        let err = group.join(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, FanOutError::TaskFailed(_)));
    }
}
