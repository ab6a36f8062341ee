//! Entity model for the Summit Reach sync core.
//!
//! Defines the typed records every other crate moves around:
//! - [`EntityData`]: tagged variants for each [`EntityKind`], never untyped JSON
//! - [`RowChange`] and the row/canonical-field parsers that turn backend
//!   rows into typed records at the boundary
//! - [`Intent`] and [`Mutation`]: the pure, re-runnable state transitions
//!   that user actions map to
//!
//! Backend rows arrive as `serde_json::Value`. They are parsed here, once;
//! anything that does not parse is a [`ModelError`] and goes no further.

mod entity;
mod intent;
mod schema;

pub use entity::{CartLine, Comment, EntityData, FollowEdge, LikeEdge, Post};
pub use intent::{Intent, Mutation, mutation};
pub use schema::{RowChange, key_for_row};

use summit_types::EntityKind;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or merging backend rows.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("row does not match {kind} schema: {source}")]
    Schema {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} row is missing field {field}")]
    MissingField {
        kind: EntityKind,
        field: &'static str,
    },

    #[error("expected a {expected} record, found {found}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    #[error(transparent)]
    Types(#[from] summit_types::Error),
}
