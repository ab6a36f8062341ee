//! Identifier types used throughout the sync core.
//!
//! Ids are opaque strings assigned by the backend. Edges (likes, follows)
//! are keyed by the composite of their two endpoints, and optimistic creates
//! use a provisional UUID v7 id until the backend assigns the real one.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix marking an id the backend has not assigned yet.
pub const PROVISIONAL_PREFIX: &str = "~";

/// Opaque identifier of an entity, unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps a backend-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the composite id of an edge from its actor and target.
    #[must_use]
    pub fn edge(actor: &str, target: &str) -> Self {
        Self(format!("{actor}:{target}"))
    }

    /// Creates a fresh provisional id for an entity created locally.
    #[must_use]
    pub fn provisional() -> Self {
        Self(format!("{PROVISIONAL_PREFIX}{}", Uuid::now_v7()))
    }

    /// Returns true if the backend has not assigned this id.
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses an id, rejecting empty strings.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.trim().is_empty() {
            return Err(Error::InvalidId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The closed set of entity kinds the cache understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    FollowEdge,
    LikeEdge,
    CartLine,
    Comment,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Post,
        EntityKind::FollowEdge,
        EntityKind::LikeEdge,
        EntityKind::CartLine,
        EntityKind::Comment,
    ];

    /// The backend table holding rows of this kind.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Post => "posts",
            EntityKind::FollowEdge => "follows",
            EntityKind::LikeEdge => "likes",
            EntityKind::CartLine => "cart_items",
            EntityKind::Comment => "comments",
        }
    }

    /// Resolves a backend table name to a kind.
    pub fn from_table(table: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.table_name() == table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    /// Returns true for kinds keyed by a composite (actor, target) id.
    #[must_use]
    pub const fn is_edge(&self) -> bool {
        matches!(self, EntityKind::FollowEdge | EntityKind::LikeEdge)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Post => "post",
            EntityKind::FollowEdge => "follow_edge",
            EntityKind::LikeEdge => "like_edge",
            EntityKind::CartLine => "cart_line",
            EntityKind::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// Addresses one cached entity: ids are only unique within a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn post(id: &str) -> Self {
        Self::new(EntityKind::Post, id)
    }

    #[must_use]
    pub fn comment(id: &str) -> Self {
        Self::new(EntityKind::Comment, id)
    }

    #[must_use]
    pub fn cart_line(id: &str) -> Self {
        Self::new(EntityKind::CartLine, id)
    }

    /// Key of the like edge between a user and a post.
    #[must_use]
    pub fn like(user_id: &str, post_id: &str) -> Self {
        Self::new(EntityKind::LikeEdge, EntityId::edge(user_id, post_id))
    }

    /// Key of the follow edge between two users.
    #[must_use]
    pub fn follow(follower_id: &str, following_id: &str) -> Self {
        Self::new(EntityKind::FollowEdge, EntityId::edge(follower_id, following_id))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
