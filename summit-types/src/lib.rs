//! Core type definitions for the Summit Reach sync core.
//!
//! This crate defines the identity types every other crate keys on:
//! - Entity identifiers (opaque strings, composite for edges, provisional
//!   for optimistic creates)
//! - Entity kinds and their backend table names
//! - Local, per-id monotonic versions
//!
//! Kind-specific record shapes live in `summit-model`, not here.

mod ids;
mod version;

pub use ids::{EntityId, EntityKey, EntityKind, PROVISIONAL_PREFIX};
pub use version::Version;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid entity id: {0}")]
    InvalidId(String),
}
