//! Read access and single-annotation operations against in-memory stores.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use release_state::fakes::{MemoryAnnotationStore, MemoryReleaseStore};
use release_state::{AnnotationKind, Outcome, ReleaseIdentity, ReleaseStore};
use release_tracker_core::{ReleaseTracker, ServiceConfig, Tick};
use serde_json::{json, Value};

fn setup() -> (ReleaseTracker, Arc<MemoryReleaseStore>, Arc<MemoryAnnotationStore>) {
    let annotations = Arc::new(MemoryAnnotationStore::new());
    let releases = Arc::new(MemoryReleaseStore::with_annotations(annotations.clone()));
    let tracker = ReleaseTracker::new(releases.clone(), annotations.clone(), ServiceConfig::default());
    (tracker, releases, annotations)
}

fn tick(offset: i64) -> Tick {
    Tick::from(Utc.timestamp_nanos(1_724_424_720_000_000_000 + offset))
}

async fn record(tracker: &ReleaseTracker, app: &str, env: &str, ver: &str, at: &Tick, payload: &str) {
    tracker
        .creation
        .create_or_update(app, env, ver, at, payload)
        .await
        .unwrap();
}

fn parse(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn get_renders_missing_annotations_blank() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), r#"{"changes":"fix"}"#).await;

    let body = parse(&tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await.unwrap());
    assert_eq!(
        body,
        json!({
            "application": "svc",
            "environment": "prod",
            "version": "1.2.0",
            "zuluEpochNanos": 1_724_424_720_000_000_000u64,
            "releaseName": "",
            "description": "",
            "changes": "fix",
            "responsibility": "",
            "buildLocation": ""
        })
    );
}

#[tokio::test]
async fn get_is_idempotent() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), r#"{"releaseName":"Aurora"}"#).await;

    let first = tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await;
    let second = tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await;
    assert!(first.is_present());
    assert_eq!(first, second);
}

#[tokio::test]
async fn get_reads_all_five_kinds() {
    let (tracker, _, annotations) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), "").await;

    tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await.unwrap();
    assert_eq!(annotations.get_calls(), AnnotationKind::ALL.len());
}

#[tokio::test]
async fn get_unknown_release_is_empty() {
    let (tracker, _, annotations) = setup();
    assert_eq!(
        tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await,
        Outcome::Empty
    );
    assert_eq!(annotations.get_calls(), 0);
}

#[tokio::test]
async fn get_with_failing_annotation_store_is_error() {
    let (tracker, _, annotations) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), "").await;
    annotations.set_fail(true);

    assert!(tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await.is_error());
}

#[tokio::test]
async fn get_with_failing_release_store_is_error() {
    let (tracker, releases, _) = setup();
    releases.set_fail(true);
    assert!(tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await.is_error());
}

#[tokio::test]
async fn by_id_matches_get() {
    let (tracker, releases, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), r#"{"changes":"fix"}"#).await;
    let release = releases
        .find_release(&ReleaseIdentity::new(
            "svc",
            "prod",
            "1.2.0",
            tick(0).to_datetime().unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(
        tracker.access.by_id(&release.id).await,
        tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await
    );
}

#[tokio::test]
async fn releases_lists_timestamps_oldest_first() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(5), "").await;
    record(&tracker, "svc", "prod", "1.2.0", &tick(1), "").await;

    let body = parse(&tracker.access.releases("svc", "prod", "1.2.0").await.unwrap());
    let stamps: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["zuluEpochNanos"].as_u64().unwrap())
        .collect();
    assert_eq!(
        stamps,
        vec![1_724_424_720_000_000_001, 1_724_424_720_000_000_005]
    );

    assert!(tracker.access.releases("svc", "prod", "9.9.9").await.is_empty());
}

#[tokio::test]
async fn all_projections_are_scoped() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.0.0", &tick(0), "").await;
    record(&tracker, "svc", "dev", "1.1.0", &tick(1), "").await;
    record(&tracker, "web", "prod", "3.0.0", &tick(2), r#"{"description":"new ui"}"#).await;

    let all = parse(&tracker.access.all().await.unwrap());
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert_eq!(all[2]["description"], "new ui");

    let svc = parse(&tracker.access.all_by_application("svc").await.unwrap());
    assert_eq!(svc.as_array().unwrap().len(), 2);

    let svc_dev = parse(
        &tracker
            .access
            .all_by_application_and_environment("svc", "dev")
            .await
            .unwrap(),
    );
    assert_eq!(svc_dev.as_array().unwrap().len(), 1);
    assert_eq!(svc_dev[0]["version"], "1.1.0");

    assert!(tracker.access.all_by_application("api").await.is_empty());
}

#[tokio::test]
async fn current_picks_latest_in_scope() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.0.0", &tick(0), "").await;
    record(&tracker, "svc", "prod", "1.1.0", &tick(10), r#"{"releaseName":"Borealis"}"#).await;
    record(&tracker, "svc", "dev", "2.0.0", &tick(20), "").await;

    let current = parse(&tracker.access.current_by_application("svc").await.unwrap());
    assert_eq!(current["version"], "2.0.0");

    let current = parse(
        &tracker
            .access
            .current_by_application_and_environment("svc", "prod")
            .await
            .unwrap(),
    );
    assert_eq!(current["version"], "1.1.0");
    assert_eq!(current["releaseName"], "Borealis");

    assert!(tracker.access.current_by_application("web").await.is_empty());
}

#[tokio::test]
async fn current_with_failing_store_is_error() {
    let (tracker, releases, _) = setup();
    releases.set_fail(true);
    assert!(tracker.access.current_by_application("svc").await.is_error());
    assert!(tracker.access.all().await.is_error());
}

// ===========================================================================
// Single annotations
// ===========================================================================

#[tokio::test]
async fn annotation_returns_labelled_body() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), r#"{"buildLocation":"ci/42"}"#).await;

    let json = tracker
        .annotations
        .annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::BuildLocation)
        .await
        .unwrap();
    assert_eq!(json, r#"{"build-location":"ci/42"}"#);

    assert!(tracker
        .annotations
        .annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Changes)
        .await
        .is_empty());
}

#[tokio::test]
async fn annotation_of_unknown_release_is_empty() {
    let (tracker, _, _) = setup();
    assert!(tracker
        .annotations
        .annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Changes)
        .await
        .is_empty());
    assert!(tracker
        .annotations
        .delete_annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Changes)
        .await
        .is_empty());
}

#[tokio::test]
async fn delete_annotation_then_read_blank() {
    let (tracker, _, _) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), r#"{"changes":"fix"}"#).await;

    assert_eq!(
        tracker
            .annotations
            .delete_annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Changes)
            .await,
        Outcome::Present(true)
    );
    assert!(tracker
        .annotations
        .delete_annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Changes)
        .await
        .is_empty());

    let body = parse(&tracker.access.get("svc", "prod", "1.2.0", &tick(0)).await.unwrap());
    assert_eq!(body["changes"], "");
}

#[tokio::test]
async fn annotation_store_failure_is_error() {
    let (tracker, _, annotations) = setup();
    record(&tracker, "svc", "prod", "1.2.0", &tick(0), "").await;
    annotations.set_fail(true);

    assert!(tracker
        .annotations
        .annotation("svc", "prod", "1.2.0", &tick(0), AnnotationKind::Description)
        .await
        .is_error());
}
