use chrono::{DateTime, TimeZone, Utc};

use release_state::{
    AnnotationKind, AnnotationStore, Outcome, ReleaseId, ReleaseIdentity, ReleaseScope,
    ReleaseStore, StoreHandle,
};

fn at(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(1_714_557_600_000_000_000 + nanos)
}

fn identity(app: &str, env: &str, ver: &str, ts: DateTime<Utc>) -> ReleaseIdentity {
    ReleaseIdentity::new(app, env, ver, ts)
}

#[tokio::test]
async fn surreal_insert_and_find_release() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();
    let ident = identity("svc", "prod", "1.2.0", at(123_456_789));

    let id = store.insert_release(&ident).await.unwrap();
    let found = store.find_release(&ident).await.unwrap();

    assert_eq!(found.id, id);
    assert_eq!(found.release_timestamp, ident.release_timestamp);
    assert_eq!(store.find_release_by_id(&id).await.unwrap(), found);
}

#[tokio::test]
async fn surreal_missing_release_is_empty() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();

    assert!(store
        .find_release(&identity("svc", "prod", "1.2.0", at(0)))
        .await
        .is_empty());
    assert!(store
        .find_release_by_id(&ReleaseId("01HZZZZZZZZZZZZZZZZZZZZZZZ".to_string()))
        .await
        .is_empty());
    assert!(store.find_releases("svc", "prod", "1.2.0").await.is_empty());
}

#[tokio::test]
async fn surreal_timestamps_differing_by_one_nanosecond_are_distinct() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();

    store
        .insert_release(&identity("svc", "prod", "1.2.0", at(2)))
        .await
        .unwrap();
    store
        .insert_release(&identity("svc", "prod", "1.2.0", at(1)))
        .await
        .unwrap();

    let releases = store.find_releases("svc", "prod", "1.2.0").await.unwrap();
    let stamps: Vec<_> = releases.iter().map(|r| r.release_timestamp).collect();
    assert_eq!(stamps, vec![at(1), at(2)]);
}

#[tokio::test]
async fn surreal_current_release_per_scope() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();
    let annotations = handle.annotation_store();

    store
        .insert_release(&identity("svc", "prod", "1.0.0", at(0)))
        .await
        .unwrap();
    let prod = store
        .insert_release(&identity("svc", "prod", "1.1.0", at(10)))
        .await
        .unwrap();
    store
        .insert_release(&identity("svc", "dev", "2.0.0", at(20)))
        .await
        .unwrap();
    assert!(
        annotations
            .upsert(AnnotationKind::ReleaseName, &prod, "Aurora")
            .await
    );

    let current = store
        .current_release(&ReleaseScope::ApplicationEnvironment(
            "svc".into(),
            "prod".into(),
        ))
        .await
        .unwrap();
    assert_eq!(current.release.id, prod);
    assert_eq!(current.release_name.as_deref(), Some("Aurora"));
    assert!(current.description.is_none());

    let current = store
        .current_release(&ReleaseScope::Application("svc".into()))
        .await
        .unwrap();
    assert_eq!(current.release.version, "2.0.0");

    assert!(store
        .current_release(&ReleaseScope::Application("web".into()))
        .await
        .is_empty());
}

#[tokio::test]
async fn surreal_current_release_tie_break_is_deterministic() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();
    let ts = at(0);

    let a = store
        .insert_release(&identity("svc", "prod", "1.0.0", ts))
        .await
        .unwrap();
    let b = store
        .insert_release(&identity("svc", "prod", "1.0.1", ts))
        .await
        .unwrap();
    let expected = std::cmp::max(a, b);

    let scope = ReleaseScope::Application("svc".into());
    for _ in 0..3 {
        let current = store.current_release(&scope).await.unwrap();
        assert_eq!(current.release.id, expected);
    }
}

#[tokio::test]
async fn surreal_all_releases_left_joins_annotations() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();
    let annotations = handle.annotation_store();

    let first = store
        .insert_release(&identity("svc", "prod", "1.0.0", at(0)))
        .await
        .unwrap();
    store
        .insert_release(&identity("web", "prod", "3.0.0", at(5)))
        .await
        .unwrap();
    annotations
        .upsert(AnnotationKind::Changes, &first, "fix")
        .await;
    annotations
        .upsert(AnnotationKind::BuildLocation, &first, "ci/42")
        .await;

    let all = store.all_releases(&ReleaseScope::All).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].release.id, first);
    assert_eq!(all[0].changes.as_deref(), Some("fix"));
    assert_eq!(all[0].build_location.as_deref(), Some("ci/42"));
    assert!(all[1].changes.is_none());

    let web = store
        .all_releases(&ReleaseScope::ApplicationEnvironment(
            "web".into(),
            "prod".into(),
        ))
        .await
        .unwrap();
    assert_eq!(web.len(), 1);
    assert_eq!(web[0].release.version, "3.0.0");
}

#[tokio::test]
async fn surreal_annotation_upsert_get_delete() {
    let handle = StoreHandle::in_memory().await.unwrap();
    let store = handle.release_store();
    let annotations = handle.annotation_store();
    let id = store
        .insert_release(&identity("svc", "prod", "1.0.0", at(0)))
        .await
        .unwrap();

    assert!(annotations.get(AnnotationKind::Description, &id).await.is_empty());

    assert!(annotations.upsert(AnnotationKind::Description, &id, "first").await);
    assert!(annotations.upsert(AnnotationKind::Description, &id, "second").await);
    assert_eq!(
        annotations.get(AnnotationKind::Description, &id).await,
        Outcome::Present("second".to_string())
    );

    assert_eq!(
        annotations.delete(AnnotationKind::Description, &id).await,
        Outcome::Present(true)
    );
    assert_eq!(
        annotations.delete(AnnotationKind::Description, &id).await,
        Outcome::Empty
    );
    assert!(annotations.get(AnnotationKind::Description, &id).await.is_empty());
}
