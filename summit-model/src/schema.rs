//! Backend row parsing.
//!
//! Rows come from the backend as loosely-typed JSON with snake_case column
//! names. Two shapes are accepted:
//! - a full row, parsed into a fresh record ([`EntityData::from_row`])
//! - a partial row (realtime payloads, canonical fields echoed by a write),
//!   overlaid onto a known record ([`EntityData::merge_row`])
//!
//! Unknown columns are ignored. Viewer-only fields (`liked`) are never read
//! from a row, so a merge always keeps the local value.

use crate::{EntityData, ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use summit_types::{EntityId, EntityKind};

/// The kind of change a realtime push reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowChange {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default, Deserialize)]
struct PostPatch {
    #[serde(alias = "user_id")]
    author_id: Option<String>,
    title: Option<String>,
    content: Option<String>,
    likes_count: Option<u32>,
    comments_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FollowPatch {
    follower_id: Option<String>,
    following_id: Option<String>,
    active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LikePatch {
    user_id: Option<String>,
    post_id: Option<String>,
    active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CartPatch {
    equipment_id: Option<String>,
    quantity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CommentPatch {
    post_id: Option<String>,
    #[serde(alias = "user_id")]
    author_id: Option<String>,
    parent_id: Option<String>,
    content: Option<String>,
    likes_count: Option<u32>,
}

fn overlay<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn parse<T: DeserializeOwned>(kind: EntityKind, row: &Value) -> ModelResult<T> {
    serde_json::from_value(row.clone()).map_err(|source| ModelError::Schema { kind, source })
}

impl EntityData {
    /// Parses a full backend row into a record of the given kind.
    pub fn from_row(kind: EntityKind, row: &Value) -> ModelResult<Self> {
        Ok(match kind {
            EntityKind::Post => EntityData::Post(parse(kind, row)?),
            EntityKind::FollowEdge => EntityData::FollowEdge(parse(kind, row)?),
            EntityKind::LikeEdge => EntityData::LikeEdge(parse(kind, row)?),
            EntityKind::CartLine => EntityData::CartLine(parse(kind, row)?),
            EntityKind::Comment => EntityData::Comment(parse(kind, row)?),
        })
    }

    /// Overlays the columns present in `row` onto this record.
    pub fn merge_row(&self, row: &Value) -> ModelResult<Self> {
        let kind = self.kind();
        let mut merged = self.clone();
        match &mut merged {
            EntityData::Post(post) => {
                let patch: PostPatch = parse(kind, row)?;
                overlay(&mut post.author_id, patch.author_id);
                overlay(&mut post.title, patch.title);
                if patch.content.is_some() {
                    post.content = patch.content;
                }
                overlay(&mut post.likes_count, patch.likes_count);
                overlay(&mut post.comments_count, patch.comments_count);
            }
            EntityData::FollowEdge(edge) => {
                let patch: FollowPatch = parse(kind, row)?;
                overlay(&mut edge.follower_id, patch.follower_id);
                overlay(&mut edge.following_id, patch.following_id);
                overlay(&mut edge.active, patch.active);
            }
            EntityData::LikeEdge(edge) => {
                let patch: LikePatch = parse(kind, row)?;
                overlay(&mut edge.user_id, patch.user_id);
                overlay(&mut edge.post_id, patch.post_id);
                overlay(&mut edge.active, patch.active);
            }
            EntityData::CartLine(line) => {
                let patch: CartPatch = parse(kind, row)?;
                overlay(&mut line.equipment_id, patch.equipment_id);
                overlay(&mut line.quantity, patch.quantity);
            }
            EntityData::Comment(comment) => {
                let patch: CommentPatch = parse(kind, row)?;
                overlay(&mut comment.post_id, patch.post_id);
                overlay(&mut comment.author_id, patch.author_id);
                if patch.parent_id.is_some() {
                    comment.parent_id = patch.parent_id;
                }
                overlay(&mut comment.content, patch.content);
                overlay(&mut comment.likes_count, patch.likes_count);
            }
        }
        Ok(merged)
    }

    /// Serializes this record as the payload of a backend write.
    pub fn to_row(&self) -> ModelResult<Value> {
        serde_json::to_value(self).map_err(|source| ModelError::Schema {
            kind: self.kind(),
            source,
        })
    }
}

fn str_field<'a>(kind: EntityKind, row: &'a Value, field: &'static str) -> ModelResult<&'a str> {
    row.get(field)
        .and_then(Value::as_str)
        .ok_or(ModelError::MissingField { kind, field })
}

/// Derives the cache id of a backend row.
///
/// Edges are keyed by their endpoints, so a like inserted by the backend
/// lands on the same id the client used for its optimistic like. Every
/// other kind uses the row's `id` column.
pub fn key_for_row(kind: EntityKind, row: &Value) -> ModelResult<EntityId> {
    match kind {
        EntityKind::LikeEdge => Ok(EntityId::edge(
            str_field(kind, row, "user_id")?,
            str_field(kind, row, "post_id")?,
        )),
        EntityKind::FollowEdge => Ok(EntityId::edge(
            str_field(kind, row, "follower_id")?,
            str_field(kind, row, "following_id")?,
        )),
        _ => match row.get("id") {
            Some(Value::String(id)) => Ok(EntityId::parse(id)?),
            Some(Value::Number(id)) => Ok(EntityId::new(id.to_string())),
            _ => Err(ModelError::MissingField { kind, field: "id" }),
        },
    }
}
