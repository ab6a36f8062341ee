use serde::{Deserialize, Serialize};
use summit_types::EntityKind;

fn present() -> bool {
    true
}

/// A post in the community feed.
///
/// `liked` is the viewing user's like flag. It never comes from a `posts`
/// row; it is derived from the viewer's like edges and preserved when a row
/// is merged into an existing post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(alias = "user_id")]
    pub author_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub comments_count: u32,
    #[serde(default)]
    pub liked: bool,
}

/// A user following another user. Rows exist only while the edge is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: String,
    pub following_id: String,
    #[serde(default = "present")]
    pub active: bool,
}

/// A user liking a post. Rows exist only while the edge is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEdge {
    pub user_id: String,
    pub post_id: String,
    #[serde(default = "present")]
    pub active: bool,
}

/// A line in the viewer's equipment cart. Quantity 0 means removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub equipment_id: String,
    #[serde(default)]
    pub quantity: u32,
}

/// A comment on a post, or a reply when `parent_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub post_id: String,
    #[serde(alias = "user_id")]
    pub author_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub liked: bool,
}

/// The state of one entity, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityData {
    Post(Post),
    FollowEdge(FollowEdge),
    LikeEdge(LikeEdge),
    CartLine(CartLine),
    Comment(Comment),
}

impl EntityData {
    /// The kind of this record.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Post(_) => EntityKind::Post,
            EntityData::FollowEdge(_) => EntityKind::FollowEdge,
            EntityData::LikeEdge(_) => EntityKind::LikeEdge,
            EntityData::CartLine(_) => EntityKind::CartLine,
            EntityData::Comment(_) => EntityKind::Comment,
        }
    }

    /// Like count, for the kinds that carry one.
    #[must_use]
    pub fn likes_count(&self) -> Option<u32> {
        match self {
            EntityData::Post(p) => Some(p.likes_count),
            EntityData::Comment(c) => Some(c.likes_count),
            _ => None,
        }
    }

    /// The user-owned on/off flag: `liked` for posts and comments, `active`
    /// for edges.
    #[must_use]
    pub fn is_active(&self) -> Option<bool> {
        match self {
            EntityData::Post(p) => Some(p.liked),
            EntityData::Comment(c) => Some(c.liked),
            EntityData::FollowEdge(f) => Some(f.active),
            EntityData::LikeEdge(l) => Some(l.active),
            EntityData::CartLine(_) => None,
        }
    }

    /// Cart quantity, for cart lines.
    #[must_use]
    pub fn quantity(&self) -> Option<u32> {
        match self {
            EntityData::CartLine(line) => Some(line.quantity),
            _ => None,
        }
    }

    /// Sets the presence flag of an edge. No effect on other kinds.
    #[must_use]
    pub fn with_presence(mut self, active: bool) -> Self {
        match &mut self {
            EntityData::FollowEdge(f) => f.active = active,
            EntityData::LikeEdge(l) => l.active = active,
            _ => {}
        }
        self
    }
}

impl From<Post> for EntityData {
    fn from(value: Post) -> Self {
        EntityData::Post(value)
    }
}

impl From<FollowEdge> for EntityData {
    fn from(value: FollowEdge) -> Self {
        EntityData::FollowEdge(value)
    }
}

impl From<LikeEdge> for EntityData {
    fn from(value: LikeEdge) -> Self {
        EntityData::LikeEdge(value)
    }
}

impl From<CartLine> for EntityData {
    fn from(value: CartLine) -> Self {
        EntityData::CartLine(value)
    }
}

impl From<Comment> for EntityData {
    fn from(value: Comment) -> Self {
        EntityData::Comment(value)
    }
}
