//! Optimistic mutation and realtime reconciliation for Summit Reach.
//!
//! Views never talk to the backend directly. They read the shared
//! [`EntityCache`](summit_cache::EntityCache) and send intents to the
//! [`OptimisticMutator`]; realtime pushes from the backend reach the same
//! cache through a [`SubscriptionBridge`].
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Remote**: the narrow [`RemoteStore`] interface the backend adapter
//!   implements (row writes and deletes plus realtime subscriptions), and a scriptable
//!   mock for tests
//! - **Mutator**: applies a mutation to the cache synchronously, then issues
//!   at most one remote write per key at a time, coalescing whatever arrives
//!   meanwhile
//! - **Bridge**: applies pushed rows under fresh local versions, merging them
//!   beneath any write still in flight for the same key
//! - **Suggestions**: the text-suggestion interface with static fallbacks
//!
//! ## Mutation lifecycle
//!
//! 1. **Apply**: the new state is put into the cache, unconfirmed
//! 2. **Write**: the remote write runs on a spawned task
//! 3. **Settle**: on success the confirmed state (with any canonical fields
//!    the backend echoed) is put; on failure the last confirmed state is
//!    restored and the caller gets [`MutationError::MutationFailed`]
//! 4. **Drain**: mutations queued meanwhile are folded into one more write,
//!    or dropped if they cancel out
//!
//! Deletes follow the same path: the entry leaves the cache at once and
//! comes back, confirmed, if the backend refuses the delete.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use summit_cache::EntityCache;
//! use summit_model::{EntityData, Intent, Post};
//! use summit_sync::remote::mock::MockRemoteStore;
//! use summit_sync::{MutationOutcome, OptimisticMutator, SyncConfig, WriteAck};
//! use summit_types::EntityKey;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = EntityCache::new();
//! let remote = Arc::new(MockRemoteStore::with_responder(|write| {
//!     Ok(WriteAck::new(write.id.clone().unwrap_or_else(|| "srv-1".into())))
//! }));
//! let mutator = OptimisticMutator::new(cache.clone(), remote, SyncConfig::default());
//!
//! let key = EntityKey::post("p1");
//! cache.load(
//!     key.clone(),
//!     EntityData::Post(Post {
//!         author_id: "alice".into(),
//!         title: "Matterhorn, Hörnli ridge".into(),
//!         content: None,
//!         likes_count: 10,
//!         comments_count: 0,
//!         liked: false,
//!     }),
//! );
//!
//! let pending = mutator.apply_intent(&key, Intent::Like)?;
//! assert_eq!(cache.get(&key).and_then(|e| e.data.likes_count()), Some(11));
//!
//! let outcome = pending.await?;
//! assert!(matches!(outcome, MutationOutcome::Confirmed(_)));
//! assert!(cache.get(&key).is_some_and(|e| e.confirmed));
//! # Ok(())
//! # }
//! ```

mod bridge;
mod config;
mod error;
mod ledger;
mod mutator;
pub mod remote;
mod suggest;

pub use bridge::{BridgeOutcome, BridgeSubscription, SubscriptionBridge};
pub use config::SyncConfig;
pub use error::{
    BridgeError, BridgeResult, MutationError, MutationResult, RemoteError, RemoteResult,
    SuggestionError,
};
pub use mutator::{MutationOutcome, OptimisticMutator, PendingMutation};
pub use remote::{RemoteEvent, RemoteStore, SubscriptionFilter, SubscriptionHandle, WriteAck};
pub use suggest::{SuggestionTopic, TextSuggestionProvider, WithFallback};
