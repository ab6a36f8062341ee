//! In-memory entity cache for Summit Reach.
//!
//! The cache is the single source of truth every view reads from. It holds
//! one fully-formed record per (kind, id) and enforces one rule: a write is
//! accepted only if its version is strictly greater than the stored one.
//! That rule is the cache's only concurrency control.
//!
//! # Architecture
//!
//! - Entries are [`CachedEntity`] values: typed data, a local version, and a
//!   `confirmed` flag that is false while a remote write is outstanding
//! - Listeners are registered per key and receive every accepted change,
//!   in order, through a FIFO outbox
//! - Entries are reference-counted by the views that display them and
//!   evicted when the last view lets go
//!
//! The cache performs no I/O.

mod cache;
mod entity;
mod error;

pub use cache::{EntityCache, Listener, Subscription};
pub use entity::{CacheChange, CachedEntity, PutOutcome};
pub use error::{CacheError, CacheResult};
