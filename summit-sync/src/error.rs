//! Error types for the sync layer.

use summit_cache::CacheError;
use summit_model::ModelError;
use summit_types::{EntityKey, EntityKind};
use thiserror::Error;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type for mutations.
pub type MutationResult<T> = Result<T, MutationError>;

/// Result type for realtime bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures reported by a [`crate::RemoteStore`] adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The backend rejected the write (constraint, permission, validation).
    #[error("rejected by backend ({code}): {message}")]
    Rejected { code: String, message: String },

    /// No session, or the session expired.
    #[error("not authenticated")]
    Unauthenticated,

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,
}

/// Errors surfaced to the caller of a mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    /// The id is not in the cache.
    #[error("entity not found: {0}")]
    NotFound(EntityKey),

    /// The intent does not apply to this kind of entity.
    #[error("intent {intent} does not apply to {kind}")]
    IntentMismatch { intent: String, kind: EntityKind },

    /// A mutation function returned a record of a different kind.
    #[error("mutation changed kind: expected {expected}, found {found}")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// The remote write failed; the cache was rolled back to the last
    /// confirmed state.
    #[error("mutation of {key} failed: {source}")]
    MutationFailed {
        key: EntityKey,
        #[source]
        source: RemoteError,
    },

    /// `apply` was called outside a tokio runtime.
    #[error("no async runtime available to issue the remote write")]
    NoRuntime,

    /// The write task went away without reporting an outcome.
    #[error("mutation abandoned before it settled")]
    Abandoned,
}

impl From<CacheError> for MutationError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(key) => MutationError::NotFound(key),
        }
    }
}

/// Errors raised while applying realtime pushes.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The pushed row names a table the cache does not model.
    #[error(transparent)]
    UnknownTable(#[from] summit_types::Error),

    /// The pushed row does not match its kind's schema.
    #[error(transparent)]
    Schema(#[from] ModelError),

    /// Subscribing or unsubscribing failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failures reported by a [`crate::TextSuggestionProvider`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuggestionError {
    /// The text service returned an error.
    #[error("suggestion service error: {0}")]
    Provider(String),

    /// The text service answered with nothing usable.
    #[error("suggestion service returned an empty response")]
    Empty,
}
