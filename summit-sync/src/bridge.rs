//! Realtime push → cache.
//!
//! Pushes are applied in arrival order, each under a fresh local version.
//! For a key with an outstanding write the push only moves the confirmed
//! base; the outstanding mutations are replayed over it, so the fields the
//! user just changed keep their local values while everything else (another
//! user's like bumping `likes_count`, say) comes from the push.

use crate::error::BridgeResult;
use crate::mutator::Shared;
use crate::remote::{RemoteEvent, RemoteStore, SubscriptionFilter, SubscriptionHandle};
use serde_json::Value;
use std::sync::Arc;
use summit_model::{EntityData, RowChange, key_for_row};
use summit_types::{EntityKey, EntityKind, Version};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// What a push did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Stored as the new confirmed state.
    Applied(Version),
    /// Merged under an outstanding write; the entry stays unconfirmed.
    Merged(Version),
    /// The entry was deleted remotely and evicted.
    Evicted,
    /// Nothing to do: a delete of an unknown or in-flight entry, or any push
    /// for an entry being deleted locally.
    Ignored,
}

/// Applies realtime pushes to the cache. Obtained from
/// [`OptimisticMutator::bridge`](crate::OptimisticMutator::bridge).
#[derive(Clone)]
pub struct SubscriptionBridge {
    shared: Arc<Shared>,
}

impl SubscriptionBridge {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Parses a pushed row and applies it.
    pub fn on_remote_event(&self, event: RemoteEvent) -> BridgeResult<BridgeOutcome> {
        let kind = EntityKind::from_table(&event.table)?;
        let key = EntityKey::new(kind, key_for_row(kind, &event.row)?);
        if let Some(hint) = event.version_hint {
            trace!("Push for {} carries remote version hint {}", key, hint);
        }
        self.apply_remote(&key, event.change, &event.row)
    }

    /// Applies a row change for `key`.
    pub fn apply_remote(
        &self,
        key: &EntityKey,
        change: RowChange,
        row: &Value,
    ) -> BridgeResult<BridgeOutcome> {
        let outcome = {
            let mut ledger = self.shared.ledger();
            let cache = &self.shared.cache;

            match (change, ledger.get_mut(key)) {
                (change, Some(pending)) if pending.removed() => {
                    // kept as the state to restore if the local delete fails
                    if change != RowChange::Delete {
                        pending.base = present(change, pending.base.merge_row(row)?);
                    }
                    debug!("Push for {} arrived while it is being deleted", key);
                    BridgeOutcome::Ignored
                }
                (RowChange::Delete, Some(pending)) if key.kind.is_edge() => {
                    pending.base = pending.base.clone().with_presence(false);
                    let merged = self.shared.stage_optimistic(key, pending.display());
                    BridgeOutcome::Merged(merged.version)
                }
                (RowChange::Delete, Some(_)) => {
                    debug!("Ignoring remote delete of {} while a write is in flight", key);
                    BridgeOutcome::Ignored
                }
                (RowChange::Delete, None) if key.kind.is_edge() => match cache.get(key) {
                    Some(current) => {
                        let stored = self
                            .shared
                            .stage_confirmed(key, current.data.with_presence(false));
                        BridgeOutcome::Applied(stored.version)
                    }
                    None => BridgeOutcome::Ignored,
                },
                (RowChange::Delete, None) => {
                    let evicted = self.shared.stage_evict(key);
                    self.shared.forget_alias(key);
                    if evicted {
                        BridgeOutcome::Evicted
                    } else {
                        BridgeOutcome::Ignored
                    }
                }
                (change, Some(pending)) => {
                    pending.base = present(change, pending.base.merge_row(row)?);
                    let merged = self.shared.stage_optimistic(key, pending.display());
                    debug!("Merged push for {} under in-flight write", key);
                    BridgeOutcome::Merged(merged.version)
                }
                (change, None) => {
                    let data = match cache.get(key) {
                        Some(current) => current.data.merge_row(row)?,
                        None => EntityData::from_row(key.kind, row)?,
                    };
                    let stored = self.shared.stage_confirmed(key, present(change, data));
                    BridgeOutcome::Applied(stored.version)
                }
            }
        };
        self.shared.cache.deliver();
        Ok(outcome)
    }

    /// Subscribes to `kind` on the remote store and starts applying its
    /// pushes on a spawned task.
    pub async fn attach(
        &self,
        kind: EntityKind,
        filter: SubscriptionFilter,
    ) -> BridgeResult<BridgeSubscription> {
        let (tx, rx) = mpsc::channel(self.shared.config.event_buffer.max(1));
        let handle = self.shared.remote.subscribe(kind, filter, tx).await?;
        debug!("Attached bridge to {} ({:?})", kind, handle);
        let task = tokio::spawn(self.clone().run(rx));
        Ok(BridgeSubscription {
            remote: self.shared.remote.clone(),
            handle,
            task,
        })
    }

    /// Applies events from `events` until the channel closes. Events that
    /// fail to apply are logged and dropped.
    pub async fn run(self, mut events: mpsc::Receiver<RemoteEvent>) {
        while let Some(event) = events.recv().await {
            let table = event.table.clone();
            if let Err(e) = self.on_remote_event(event) {
                warn!("Dropping push from {}: {}", table, e);
            }
        }
        debug!("Realtime channel closed");
    }
}

/// An insert or update means the row exists; for edges that is the edge's
/// presence flag.
fn present(change: RowChange, data: EntityData) -> EntityData {
    match change {
        RowChange::Insert => data.with_presence(true),
        _ => data,
    }
}

/// A live realtime subscription feeding a [`SubscriptionBridge`].
pub struct BridgeSubscription {
    remote: Arc<dyn RemoteStore>,
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

impl BridgeSubscription {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Unsubscribes and waits for already-delivered events to be applied.
    pub async fn close(self) -> BridgeResult<()> {
        self.remote.unsubscribe(self.handle).await?;
        if let Err(e) = self.task.await {
            warn!("Bridge task ended abnormally: {}", e);
        }
        Ok(())
    }
}
