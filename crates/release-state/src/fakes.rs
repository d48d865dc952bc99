//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryReleaseStore` and `MemoryAnnotationStore` that satisfy the
//! trait contracts without any external dependencies. Both support fault
//! injection and record the calls made against them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::outcome::Outcome;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryReleaseStore
// ---------------------------------------------------------------------------

/// In-memory release store backed by a `Vec<Release>`.
///
/// Ids are zero-padded sequence numbers, so they order by insertion like the
/// ULID keys of the real store. Projections join annotations from the
/// attached [`MemoryAnnotationStore`], if any.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    releases: Mutex<Vec<Release>>,
    annotations: Option<Arc<MemoryAnnotationStore>>,
    next_seq: AtomicU64,
    insert_calls: AtomicUsize,
    fail: AtomicBool,
    lose_insert_race: AtomicBool,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `current_release`/`all_releases` with this annotation store.
    pub fn with_annotations(annotations: Arc<MemoryAnnotationStore>) -> Self {
        Self {
            annotations: Some(annotations),
            ..Self::default()
        }
    }

    /// Make every subsequent operation report `Error`.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The next insert behaves as if a concurrent writer got there first:
    /// the row is stored but the call reports `Error`.
    pub fn lose_next_insert_race(&self) {
        self.lose_insert_race.store(true, Ordering::SeqCst);
    }

    /// Number of `insert_release` calls, successful or not.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.releases.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn failing(&self) -> bool {
        self.fail.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> ReleaseId {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        ReleaseId(format!("{seq:026}"))
    }

    fn join(&self, release: Release) -> FullRelease {
        let mut full = FullRelease::bare(release);
        if let Some(annotations) = &self.annotations {
            for kind in AnnotationKind::ALL {
                full.set_annotation(kind, annotations.value(kind, &full.release.id));
            }
        }
        full
    }

    fn sorted_in_scope(&self, scope: &ReleaseScope) -> Vec<Release> {
        let releases = self.releases.lock().unwrap();
        let mut in_scope: Vec<Release> = releases
            .iter()
            .filter(|r| scope.matches(r))
            .cloned()
            .collect();
        in_scope.sort_by(|a, b| {
            a.release_timestamp
                .cmp(&b.release_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        in_scope
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn find_release(&self, identity: &ReleaseIdentity) -> Outcome<Release> {
        if self.failing() {
            return Outcome::Error;
        }
        let releases = self.releases.lock().unwrap();
        releases
            .iter()
            .find(|r| r.identity() == *identity)
            .cloned()
            .into()
    }

    async fn find_release_by_id(&self, id: &ReleaseId) -> Outcome<Release> {
        if self.failing() {
            return Outcome::Error;
        }
        let releases = self.releases.lock().unwrap();
        releases.iter().find(|r| r.id == *id).cloned().into()
    }

    async fn find_releases(
        &self,
        application: &str,
        environment: &str,
        version: &str,
    ) -> Outcome<Vec<Release>> {
        if self.failing() {
            return Outcome::Error;
        }
        let matching = self
            .sorted_in_scope(&ReleaseScope::ApplicationEnvironment(
                application.to_string(),
                environment.to_string(),
            ))
            .into_iter()
            .filter(|r| r.version == version)
            .collect();
        Outcome::from_collection(matching)
    }

    async fn insert_release(&self, identity: &ReleaseIdentity) -> Outcome<ReleaseId> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing() {
            return Outcome::Error;
        }

        let mut releases = self.releases.lock().unwrap();
        if releases.iter().any(|r| r.identity() == *identity) {
            return Outcome::Error;
        }

        let id = self.next_id();
        releases.push(Release {
            id: id.clone(),
            application: identity.application.clone(),
            environment: identity.environment.clone(),
            version: identity.version.clone(),
            release_timestamp: identity.release_timestamp,
        });

        if self.lose_insert_race.swap(false, Ordering::SeqCst) {
            return Outcome::Error;
        }
        Outcome::Present(id)
    }

    async fn current_release(&self, scope: &ReleaseScope) -> Outcome<FullRelease> {
        if self.failing() {
            return Outcome::Error;
        }
        self.sorted_in_scope(scope)
            .pop()
            .map(|release| self.join(release))
            .into()
    }

    async fn all_releases(&self, scope: &ReleaseScope) -> Outcome<Vec<FullRelease>> {
        if self.failing() {
            return Outcome::Error;
        }
        let joined = self
            .sorted_in_scope(scope)
            .into_iter()
            .map(|release| self.join(release))
            .collect();
        Outcome::from_collection(joined)
    }
}

// ---------------------------------------------------------------------------
// MemoryAnnotationStore
// ---------------------------------------------------------------------------

/// One recorded `upsert` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertCall {
    pub kind: AnnotationKind,
    pub release_id: ReleaseId,
    pub value: String,
}

/// In-memory annotation store backed by a `HashMap<(kind, release id), value>`.
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    values: Mutex<HashMap<(AnnotationKind, ReleaseId), String>>,
    upserts: Mutex<Vec<UpsertCall>>,
    get_calls: AtomicUsize,
    fail: AtomicBool,
    rejected: Mutex<HashSet<AnnotationKind>>,
    hanging: Mutex<HashSet<AnnotationKind>>,
    delays: Mutex<HashMap<AnnotationKind, Duration>>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Upserts of `kind` report `false` without writing.
    pub fn reject_upserts(&self, kind: AnnotationKind) {
        self.rejected.lock().unwrap().insert(kind);
    }

    /// Operations on `kind` never complete.
    pub fn hang(&self, kind: AnnotationKind) {
        self.hanging.lock().unwrap().insert(kind);
    }

    /// Operations on `kind` sleep for `delay` before touching the map.
    pub fn delay(&self, kind: AnnotationKind, delay: Duration) {
        self.delays.lock().unwrap().insert(kind, delay);
    }

    /// Store a value directly, bypassing call recording.
    pub fn seed(&self, kind: AnnotationKind, release_id: &ReleaseId, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap()
            .insert((kind, release_id.clone()), value.into());
    }

    pub fn value(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(&(kind, release_id.clone()))
            .cloned()
    }

    /// Every `upsert` call in arrival order, including rejected ones.
    pub fn upsert_calls(&self) -> Vec<UpsertCall> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self, kind: AnnotationKind) {
        let hangs = self.hanging.lock().unwrap().contains(&kind);
        if hangs {
            std::future::pending::<()>().await;
        }
        let delay = self.delays.lock().unwrap().get(&kind).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AnnotationStore for MemoryAnnotationStore {
    async fn upsert(&self, kind: AnnotationKind, release_id: &ReleaseId, value: &str) -> bool {
        self.upserts.lock().unwrap().push(UpsertCall {
            kind,
            release_id: release_id.clone(),
            value: value.to_string(),
        });
        self.stall(kind).await;

        if self.fail.load(Ordering::SeqCst) || self.rejected.lock().unwrap().contains(&kind) {
            return false;
        }
        self.seed(kind, release_id, value);
        true
    }

    async fn get(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<String> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.stall(kind).await;

        if self.fail.load(Ordering::SeqCst) {
            return Outcome::Error;
        }
        self.value(kind, release_id).into()
    }

    async fn delete(&self, kind: AnnotationKind, release_id: &ReleaseId) -> Outcome<bool> {
        self.stall(kind).await;

        if self.fail.load(Ordering::SeqCst) {
            return Outcome::Error;
        }
        let removed = self
            .values
            .lock()
            .unwrap()
            .remove(&(kind, release_id.clone()));
        removed.map(|_| true).into()
    }
}
