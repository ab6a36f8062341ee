//! Error types for the cache layer.

use summit_types::EntityKey;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache operations.
///
/// A stale write is not an error; see [`crate::PutOutcome::Stale`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The id has not been loaded (or has been evicted).
    #[error("entity not found: {0}")]
    NotFound(EntityKey),
}
