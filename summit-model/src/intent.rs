//! User intents and the mutation functions they map to.
//!
//! Every mutation is a pure function old state → new state. Mutations may be
//! run more than once: whenever the confirmed base of an id changes while
//! the mutation is still outstanding, it is replayed over the new base.
//! Set-style intents ("make it liked") are idempotent under replay; relative
//! ones (toggles, quantity adjustments) apply to whatever base they are
//! replayed on.

use crate::EntityData;
use std::fmt;
use std::sync::Arc;
use summit_types::EntityKind;

/// A re-runnable state transition for one entity.
pub type Mutation = Arc<dyn Fn(&EntityData) -> EntityData + Send + Sync>;

/// Wraps a closure as a [`Mutation`].
pub fn mutation<F>(f: F) -> Mutation
where
    F: Fn(&EntityData) -> EntityData + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The closed set of actions a view can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Like,
    Unlike,
    ToggleLike,
    Follow,
    Unfollow,
    ToggleFollow,
    SetQuantity(u32),
    AdjustQuantity(i32),
    EditContent(String),
}

impl Intent {
    /// Returns true if this intent can be applied to entities of `kind`.
    #[must_use]
    pub fn accepts(&self, kind: EntityKind) -> bool {
        match self {
            Intent::Like | Intent::Unlike | Intent::ToggleLike => matches!(
                kind,
                EntityKind::Post | EntityKind::Comment | EntityKind::LikeEdge
            ),
            Intent::Follow | Intent::Unfollow | Intent::ToggleFollow => {
                kind == EntityKind::FollowEdge
            }
            Intent::SetQuantity(_) | Intent::AdjustQuantity(_) => kind == EntityKind::CartLine,
            Intent::EditContent(_) => matches!(kind, EntityKind::Post | EntityKind::Comment),
        }
    }

    /// Computes the state after this intent. Kinds the intent does not
    /// accept are returned unchanged.
    #[must_use]
    pub fn apply(&self, data: &EntityData) -> EntityData {
        let mut next = data.clone();
        match self {
            Intent::Like => set_liked(&mut next, true),
            Intent::Unlike => set_liked(&mut next, false),
            Intent::ToggleLike => {
                if let Some(active) = data.is_active() {
                    set_liked(&mut next, !active);
                }
            }
            Intent::Follow | Intent::Unfollow | Intent::ToggleFollow => {
                if let EntityData::FollowEdge(edge) = &mut next {
                    edge.active = match self {
                        Intent::Follow => true,
                        Intent::Unfollow => false,
                        _ => !edge.active,
                    };
                }
            }
            Intent::SetQuantity(n) => {
                if let EntityData::CartLine(line) = &mut next {
                    line.quantity = *n;
                }
            }
            Intent::AdjustQuantity(delta) => {
                if let EntityData::CartLine(line) = &mut next {
                    line.quantity = line.quantity.saturating_add_signed(*delta);
                }
            }
            Intent::EditContent(text) => match &mut next {
                EntityData::Post(post) => post.content = Some(text.clone()),
                EntityData::Comment(comment) => comment.content = text.clone(),
                _ => {}
            },
        }
        next
    }

    /// Converts this intent into a [`Mutation`].
    #[must_use]
    pub fn into_mutation(self) -> Mutation {
        mutation(move |data| self.apply(data))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Like => f.write_str("like"),
            Intent::Unlike => f.write_str("unlike"),
            Intent::ToggleLike => f.write_str("toggle-like"),
            Intent::Follow => f.write_str("follow"),
            Intent::Unfollow => f.write_str("unfollow"),
            Intent::ToggleFollow => f.write_str("toggle-follow"),
            Intent::SetQuantity(n) => write!(f, "set-quantity({n})"),
            Intent::AdjustQuantity(d) => write!(f, "adjust-quantity({d:+})"),
            Intent::EditContent(_) => f.write_str("edit-content"),
        }
    }
}

// Likes move the counter with the flag so a post never shows a like the
// count disagrees with. The counter saturates at zero.
fn set_liked(data: &mut EntityData, liked: bool) {
    let (flag, count) = match data {
        EntityData::Post(post) => (&mut post.liked, Some(&mut post.likes_count)),
        EntityData::Comment(comment) => (&mut comment.liked, Some(&mut comment.likes_count)),
        EntityData::LikeEdge(edge) => (&mut edge.active, None),
        _ => return,
    };
    if *flag == liked {
        return;
    }
    *flag = liked;
    if let Some(count) = count {
        *count = if liked {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
    }
}
