use pretty_assertions::assert_eq;
use summit_model::{CartLine, Comment, EntityData, FollowEdge, LikeEdge, Post};
use summit_types::EntityKind;

fn post(likes: u32, liked: bool) -> EntityData {
    EntityData::Post(Post {
        author_id: "alice".into(),
        title: "Dawn on the Matterhorn".into(),
        content: Some("Hörnli ridge, 4am start".into()),
        likes_count: likes,
        comments_count: 2,
        liked,
    })
}

// ── Kinds & accessors ────────────────────────────────────────────

#[test]
fn kind_matches_variant() {
    assert_eq!(post(0, false).kind(), EntityKind::Post);
    let line = EntityData::CartLine(CartLine {
        equipment_id: "ice-axe".into(),
        quantity: 1,
    });
    assert_eq!(line.kind(), EntityKind::CartLine);
}

#[test]
fn likes_count_only_for_countable_kinds() {
    assert_eq!(post(10, false).likes_count(), Some(10));
    let edge = EntityData::LikeEdge(LikeEdge {
        user_id: "u".into(),
        post_id: "p".into(),
        active: true,
    });
    assert_eq!(edge.likes_count(), None);
}

#[test]
fn is_active_covers_flags_and_edges() {
    assert_eq!(post(1, true).is_active(), Some(true));
    let follow = EntityData::FollowEdge(FollowEdge {
        follower_id: "a".into(),
        following_id: "b".into(),
        active: false,
    });
    assert_eq!(follow.is_active(), Some(false));
    let line = EntityData::CartLine(CartLine {
        equipment_id: "rope".into(),
        quantity: 2,
    });
    assert_eq!(line.is_active(), None);
    assert_eq!(line.quantity(), Some(2));
}

#[test]
fn with_presence_only_touches_edges() {
    let like = EntityData::LikeEdge(LikeEdge {
        user_id: "u".into(),
        post_id: "p".into(),
        active: true,
    });
    assert_eq!(like.with_presence(false).is_active(), Some(false));
    assert_eq!(post(3, true).with_presence(false), post(3, true));
}

// ── Serialization ────────────────────────────────────────────────

#[test]
fn serialized_record_is_tagged_by_kind() {
    let json = serde_json::to_value(post(5, false)).unwrap();
    assert_eq!(json["kind"], "post");
    assert_eq!(json["likes_count"], 5);
}

#[test]
fn serde_roundtrip_comment() {
    let original = EntityData::Comment(Comment {
        post_id: "p1".into(),
        author_id: "bob".into(),
        parent_id: Some("c0".into()),
        content: "Which crampons?".into(),
        likes_count: 0,
        liked: false,
    });
    let text = serde_json::to_string(&original).unwrap();
    let parsed: EntityData = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, original);
}
