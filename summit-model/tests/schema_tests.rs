use pretty_assertions::assert_eq;
use serde_json::json;
use summit_model::{EntityData, ModelError, Post, RowChange, key_for_row};
use summit_types::{EntityId, EntityKind};

// ── from_row ─────────────────────────────────────────────────────

#[test]
fn post_row_parses_with_user_id_alias() {
    let row = json!({
        "id": "p1",
        "user_id": "alice",
        "title": "Eiger north face",
        "content": null,
        "likes_count": 12,
        "comments_count": 3,
        "created_at": "2024-06-01T05:00:00Z"
    });
    let data = EntityData::from_row(EntityKind::Post, &row).unwrap();
    assert_eq!(
        data,
        EntityData::Post(Post {
            author_id: "alice".into(),
            title: "Eiger north face".into(),
            content: None,
            likes_count: 12,
            comments_count: 3,
            liked: false,
        })
    );
}

#[test]
fn like_row_is_active_by_presence() {
    let row = json!({"id": "l9", "user_id": "bob", "post_id": "p1"});
    let data = EntityData::from_row(EntityKind::LikeEdge, &row).unwrap();
    assert_eq!(data.is_active(), Some(true));
}

#[test]
fn row_missing_required_column_is_schema_error() {
    let row = json!({"id": "c1", "post_id": "p1"});
    let err = EntityData::from_row(EntityKind::Comment, &row).unwrap_err();
    assert!(matches!(err, ModelError::Schema { kind: EntityKind::Comment, .. }));
}

#[test]
fn negative_count_is_rejected() {
    let row = json!({"id": "p1", "user_id": "a", "likes_count": -1});
    assert!(EntityData::from_row(EntityKind::Post, &row).is_err());
}

// ── merge_row ────────────────────────────────────────────────────

#[test]
fn merge_row_keeps_viewer_flag() {
    let local = EntityData::Post(Post {
        author_id: "alice".into(),
        title: "t".into(),
        content: None,
        likes_count: 10,
        comments_count: 0,
        liked: true,
    });
    let merged = local
        .merge_row(&json!({"likes_count": 14, "liked": false, "extra": 1}))
        .unwrap();
    assert_eq!(merged.likes_count(), Some(14));
    assert_eq!(merged.is_active(), Some(true));
}

#[test]
fn merge_row_with_empty_object_is_identity() {
    let local = EntityData::from_row(
        EntityKind::CartLine,
        &json!({"id": "ci1", "equipment_id": "harness", "quantity": 2}),
    )
    .unwrap();
    assert_eq!(local.merge_row(&json!({})).unwrap(), local);
}

#[test]
fn write_row_carries_kind_and_columns() {
    let line = EntityData::from_row(
        EntityKind::CartLine,
        &json!({"id": "ci1", "equipment_id": "harness", "quantity": 2}),
    )
    .unwrap();
    let row = line.to_row().unwrap();
    assert_eq!(
        row,
        json!({"kind": "cart_line", "equipment_id": "harness", "quantity": 2})
    );
    assert_eq!(EntityData::from_row(EntityKind::CartLine, &row).unwrap(), line);
}

#[test]
fn merge_row_rejects_non_object() {
    let local = EntityData::from_row(
        EntityKind::CartLine,
        &json!({"equipment_id": "harness", "quantity": 2}),
    )
    .unwrap();
    assert!(local.merge_row(&json!(42)).is_err());
}

// ── key_for_row ──────────────────────────────────────────────────

#[test]
fn edge_keys_are_composite() {
    let like = json!({"id": "l1", "user_id": "bob", "post_id": "p1"});
    assert_eq!(
        key_for_row(EntityKind::LikeEdge, &like).unwrap(),
        EntityId::edge("bob", "p1")
    );
    let follow = json!({"id": "f1", "follower_id": "bob", "following_id": "alice"});
    assert_eq!(
        key_for_row(EntityKind::FollowEdge, &follow).unwrap(),
        EntityId::edge("bob", "alice")
    );
}

#[test]
fn numeric_ids_are_stringified() {
    let row = json!({"id": 42, "equipment_id": "rope"});
    assert_eq!(
        key_for_row(EntityKind::CartLine, &row).unwrap(),
        EntityId::new("42")
    );
}

#[test]
fn missing_id_is_reported() {
    let err = key_for_row(EntityKind::Post, &json!({"title": "x"})).unwrap_err();
    assert!(matches!(err, ModelError::MissingField { field: "id", .. }));
}

#[test]
fn row_change_uses_postgres_names() {
    let change: RowChange = serde_json::from_str("\"DELETE\"").unwrap();
    assert_eq!(change, RowChange::Delete);
}
