use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use summit_cache::EntityCache;
use summit_model::{EntityData, Intent, LikeEdge, Post, RowChange};
use summit_sync::remote::mock::MockRemoteStore;
use summit_sync::{
    BridgeError, BridgeOutcome, MutationOutcome, OptimisticMutator, RemoteEvent,
    SubscriptionFilter, SyncConfig,
};
use summit_types::{EntityKey, EntityKind, Version};

fn setup() -> (EntityCache, Arc<MockRemoteStore>, OptimisticMutator) {
    let cache = EntityCache::new();
    let remote = Arc::new(MockRemoteStore::new());
    let mutator = OptimisticMutator::new(cache.clone(), remote.clone(), SyncConfig::default());
    (cache, remote, mutator)
}

fn post(likes: u32, liked: bool) -> EntityData {
    EntityData::Post(Post {
        author_id: "alice".into(),
        title: "Eiger North Face".into(),
        content: None,
        likes_count: likes,
        comments_count: 0,
        liked,
    })
}

fn post_row(likes: u32) -> serde_json::Value {
    json!({
        "id": "p1",
        "user_id": "alice",
        "title": "Eiger North Face",
        "likes_count": likes,
        "comments_count": 0,
        "created_at": "2025-06-01T08:00:00Z"
    })
}

fn event(kind: EntityKind, change: RowChange, row: serde_json::Value) -> RemoteEvent {
    RemoteEvent::new(kind, change, row)
}

// ── Direct pushes ────────────────────────────────────────────────

#[tokio::test]
async fn push_for_unknown_row_creates_entry() {
    let (cache, _remote, mutator) = setup();
    let bridge = mutator.bridge();

    let outcome = bridge
        .on_remote_event(event(EntityKind::Post, RowChange::Insert, post_row(3)))
        .unwrap();

    assert_eq!(outcome, BridgeOutcome::Applied(Version::new(1)));
    let entry = cache.get(&EntityKey::post("p1")).unwrap();
    assert!(entry.confirmed);
    assert_eq!(entry.data, post(3, false));
}

#[tokio::test]
async fn push_preserves_viewer_flag() {
    let (cache, _remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(10, true));

    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(12)))
        .unwrap();

    assert_eq!(outcome, BridgeOutcome::Applied(Version::new(2)));
    assert_eq!(cache.get(&key).unwrap().data, post(12, true));
}

#[tokio::test]
async fn every_push_gets_a_fresh_version() {
    let (cache, _remote, mutator) = setup();
    let bridge = mutator.bridge();
    let mut hinted = event(EntityKind::Post, RowChange::Update, post_row(1));
    // remote hints are not used for ordering
    hinted.version_hint = Some(999);

    bridge.on_remote_event(hinted).unwrap();
    bridge
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(2)))
        .unwrap();
    bridge
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(2)))
        .unwrap();

    let entry = cache.get(&EntityKey::post("p1")).unwrap();
    assert_eq!(entry.version, Version::new(3));
    assert_eq!(entry.data.likes_count(), Some(2));
}

// ── Pushes racing local mutations ────────────────────────────────

#[tokio::test]
async fn push_during_in_flight_like_keeps_local_flag() {
    let (cache, remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(10, false));

    let pending = mutator.apply_intent(&key, Intent::Like).unwrap();
    let write = remote.next_write().await.unwrap();

    // another user liked meanwhile
    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(11)))
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Merged(Version::new(3)));

    let entry = cache.get(&key).unwrap();
    assert!(!entry.confirmed);
    assert_eq!(entry.data.is_active(), Some(true));
    assert_eq!(entry.data.likes_count(), Some(12));

    write.succeed(json!({}));
    assert_eq!(
        pending.await.unwrap(),
        MutationOutcome::Confirmed(post(12, true))
    );

    let entry = cache.get(&key).unwrap();
    assert!(entry.confirmed);
    assert_eq!(entry.data, post(12, true));
    assert_eq!(entry.version, Version::new(4));
}

#[tokio::test]
async fn push_under_failed_like_survives_rollback() {
    let (cache, remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(10, false));

    let pending = mutator.apply_intent(&key, Intent::Like).unwrap();
    let write = remote.next_write().await.unwrap();
    mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(11)))
        .unwrap();

    write.fail(summit_sync::RemoteError::Timeout);
    assert!(pending.await.is_err());

    // rolled back to the last confirmed truth, which now includes the push
    assert_eq!(cache.get(&key).unwrap().data, post(11, false));
}

#[tokio::test]
async fn edge_insert_during_in_flight_unlike_keeps_local_flag() {
    let (cache, remote, mutator) = setup();
    let key = EntityKey::like("u1", "p1");
    cache.load(
        key.clone(),
        EntityData::LikeEdge(LikeEdge {
            user_id: "u1".into(),
            post_id: "p1".into(),
            active: true,
        }),
    );

    let pending = mutator.apply_intent(&key, Intent::Unlike).unwrap();
    let write = remote.next_write().await.unwrap();

    // late echo of an older insert
    mutator
        .bridge()
        .on_remote_event(event(
            EntityKind::LikeEdge,
            RowChange::Insert,
            json!({ "id": 77, "user_id": "u1", "post_id": "p1" }),
        ))
        .unwrap();
    assert_eq!(cache.get(&key).unwrap().data.is_active(), Some(false));

    write.succeed(json!({}));
    pending.await.unwrap();
    assert_eq!(cache.get(&key).unwrap().data.is_active(), Some(false));
}

// ── Deletes ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_evicts_idle_entry() {
    let (cache, _remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(1, false));

    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Delete, json!({ "id": "p1" })))
        .unwrap();

    assert_eq!(outcome, BridgeOutcome::Evicted);
    assert!(cache.get(&key).is_none());
}

#[tokio::test]
async fn delete_of_unknown_entry_is_ignored() {
    let (_cache, _remote, mutator) = setup();
    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Delete, json!({ "id": "p9" })))
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Ignored);
}

#[tokio::test]
async fn delete_during_in_flight_write_is_skipped() {
    let (cache, remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(1, false));
    let _pending = mutator.apply_intent(&key, Intent::Like).unwrap();
    let _write = remote.next_write().await.unwrap();

    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Delete, json!({ "id": "p1" })))
        .unwrap();

    assert_eq!(outcome, BridgeOutcome::Ignored);
    assert_eq!(cache.get(&key).unwrap().data, post(2, true));
}

#[tokio::test]
async fn push_during_local_delete_is_kept_for_restore() {
    let (cache, remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(10, false));

    let deleted = mutator.delete(&key).unwrap();
    let parked = remote.next_delete().await.unwrap();

    let outcome = mutator
        .bridge()
        .on_remote_event(event(EntityKind::Post, RowChange::Update, post_row(12)))
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Ignored);
    assert!(cache.get(&key).is_none());

    parked.fail(summit_sync::RemoteError::Timeout);
    assert!(deleted.await.is_err());

    let restored = cache.get(&key).unwrap();
    assert!(restored.confirmed);
    assert_eq!(restored.data, post(12, false));
}

#[tokio::test]
async fn edge_delete_marks_inactive() {
    let (cache, _remote, mutator) = setup();
    let key = EntityKey::follow("u1", "u2");
    let outcome = mutator
        .bridge()
        .on_remote_event(event(
            EntityKind::FollowEdge,
            RowChange::Insert,
            json!({ "follower_id": "u1", "following_id": "u2" }),
        ))
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Applied(Version::new(1)));
    assert_eq!(cache.get(&key).unwrap().data.is_active(), Some(true));

    let outcome = mutator
        .bridge()
        .on_remote_event(event(
            EntityKind::FollowEdge,
            RowChange::Delete,
            json!({ "follower_id": "u1", "following_id": "u2" }),
        ))
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Applied(Version::new(2)));
    assert_eq!(cache.get(&key).unwrap().data.is_active(), Some(false));
}

// ── Rejected pushes ──────────────────────────────────────────────

#[tokio::test]
async fn unknown_table_is_rejected() {
    let (cache, _remote, mutator) = setup();
    let err = mutator
        .bridge()
        .on_remote_event(RemoteEvent {
            table: "messages".into(),
            change: RowChange::Insert,
            row: json!({ "id": "m1" }),
            version_hint: None,
        })
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownTable(_)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn malformed_row_is_rejected_without_touching_cache() {
    let (cache, _remote, mutator) = setup();
    let key = EntityKey::post("p1");
    cache.load(key.clone(), post(1, false));

    let err = mutator
        .bridge()
        .on_remote_event(event(
            EntityKind::Post,
            RowChange::Update,
            json!({ "id": "p1", "likes_count": -4 }),
        ))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Schema(_)));
    assert_eq!(cache.version(&key), Version::new(1));
}

// ── Attached subscriptions ───────────────────────────────────────

async fn until(mut done: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never held");
}

#[tokio::test]
async fn attached_bridge_applies_pushes_in_order() {
    let (cache, remote, mutator) = setup();
    let subscription = mutator
        .bridge()
        .attach(EntityKind::Post, SubscriptionFilter::All)
        .await
        .unwrap();
    assert_eq!(remote.subscriber_count(), 1);

    for likes in [1, 2, 3] {
        let delivered = remote
            .push(event(EntityKind::Post, RowChange::Update, post_row(likes)))
            .await;
        assert_eq!(delivered, 1);
    }
    let key = EntityKey::post("p1");
    until(|| cache.version(&key) == Version::new(3)).await;
    assert_eq!(cache.get(&key).unwrap().data.likes_count(), Some(3));

    subscription.close().await.unwrap();
    assert_eq!(remote.subscriber_count(), 0);
}

#[tokio::test]
async fn attached_bridge_skips_bad_rows_and_keeps_running() {
    let (cache, remote, mutator) = setup();
    let subscription = mutator
        .bridge()
        .attach(EntityKind::Post, SubscriptionFilter::All)
        .await
        .unwrap();

    remote
        .push(event(EntityKind::Post, RowChange::Update, json!({ "title": "no id" })))
        .await;
    remote
        .push(event(EntityKind::Post, RowChange::Insert, post_row(5)))
        .await;

    subscription.close().await.unwrap();
    assert_eq!(
        cache.get(&EntityKey::post("p1")).unwrap().data.likes_count(),
        Some(5)
    );
}

#[tokio::test]
async fn filtered_subscription_only_sees_matching_rows() {
    let (cache, remote, mutator) = setup();
    let subscription = mutator
        .bridge()
        .attach(EntityKind::Post, SubscriptionFilter::eq("user_id", "bob"))
        .await
        .unwrap();

    let delivered = remote
        .push(event(EntityKind::Post, RowChange::Insert, post_row(1)))
        .await;
    assert_eq!(delivered, 0);

    subscription.close().await.unwrap();
    assert!(cache.is_empty());
}
