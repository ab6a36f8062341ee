use summit_types::{EntityId, EntityKey, EntityKind, Error, PROVISIONAL_PREFIX};
use std::collections::HashSet;
use std::str::FromStr;

// ── EntityId ──────────────────────────────────────────────────────

#[test]
fn entity_id_display_is_raw_string() {
    let id = EntityId::new("p1");
    assert_eq!(id.to_string(), "p1");
    assert_eq!(id.as_str(), "p1");
}

#[test]
fn entity_id_edge_is_composite() {
    let id = EntityId::edge("alice", "p1");
    assert_eq!(id.as_str(), "alice:p1");
    assert!(!id.is_provisional());
}

#[test]
fn provisional_ids_are_unique_and_marked() {
    let a = EntityId::provisional();
    let b = EntityId::provisional();
    assert_ne!(a, b);
    assert!(a.is_provisional());
    assert!(a.as_str().starts_with(PROVISIONAL_PREFIX));
}

#[test]
fn backend_ids_are_not_provisional() {
    assert!(!EntityId::new("8d4f0c1e").is_provisional());
}

#[test]
fn entity_id_parse_rejects_blank() {
    assert!(matches!(EntityId::parse(""), Err(Error::InvalidId(_))));
    assert!(matches!(EntityId::from_str("   "), Err(Error::InvalidId(_))));
}

#[test]
fn entity_id_from_str_roundtrip() {
    let id: EntityId = "c-42".parse().unwrap();
    assert_eq!(id, EntityId::from("c-42"));
}

#[test]
fn entity_id_serializes_transparently() {
    let json = serde_json::to_string(&EntityId::new("p1")).unwrap();
    assert_eq!(json, "\"p1\"");
}

// ── EntityKind ────────────────────────────────────────────────────

#[test]
fn kind_table_names_resolve_back() {
    for kind in EntityKind::ALL {
        assert_eq!(EntityKind::from_table(kind.table_name()).unwrap(), kind);
    }
}

#[test]
fn unknown_table_is_rejected() {
    match EntityKind::from_table("notifications") {
        Err(Error::UnknownTable(t)) => assert_eq!(t, "notifications"),
        other => panic!("Expected UnknownTable, got {other:?}"),
    }
}

#[test]
fn only_likes_and_follows_are_edges() {
    let edges: Vec<_> = EntityKind::ALL.into_iter().filter(|k| k.is_edge()).collect();
    assert_eq!(edges, vec![EntityKind::FollowEdge, EntityKind::LikeEdge]);
}

#[test]
fn kind_serde_is_snake_case() {
    let json = serde_json::to_string(&EntityKind::CartLine).unwrap();
    assert_eq!(json, "\"cart_line\"");
}

// ── EntityKey ─────────────────────────────────────────────────────

#[test]
fn same_id_different_kind_are_distinct_keys() {
    let mut keys = HashSet::new();
    keys.insert(EntityKey::post("x"));
    keys.insert(EntityKey::comment("x"));
    assert_eq!(keys.len(), 2);
}

#[test]
fn edge_key_helpers() {
    let like = EntityKey::like("alice", "p1");
    assert_eq!(like.kind, EntityKind::LikeEdge);
    assert_eq!(like.id.as_str(), "alice:p1");

    let follow = EntityKey::follow("alice", "bob");
    assert_eq!(follow.kind, EntityKind::FollowEdge);
    assert_eq!(follow.to_string(), "follow_edge/alice:bob");
}
