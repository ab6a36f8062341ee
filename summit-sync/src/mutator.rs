//! Optimistic mutation with one ordered remote write per key.
//!
//! `apply` updates the cache synchronously and returns before any network
//! I/O. The write runs on a spawned task. While a key has a write in flight,
//! further mutations of that key are queued; when the write settles the
//! queue is folded over the new confirmed state and sent as a single write,
//! or dropped if it nets out to no change.
//!
//! A delete takes the entry out of the cache at once and restores the last
//! confirmed state if the backend refuses it.

use crate::bridge::SubscriptionBridge;
use crate::config::SyncConfig;
use crate::error::{MutationError, MutationResult, RemoteError, RemoteResult};
use crate::ledger::{PendingKey, Waiter, fold};
use crate::remote::{RemoteStore, WriteAck};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use summit_cache::{CachedEntity, EntityCache};
use summit_model::{EntityData, Intent, Mutation, mutation};
use summit_types::{EntityId, EntityKey, Version};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How a mutation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend acknowledged the write. Carries the confirmed state.
    Confirmed(EntityData),
    /// An optimistic create landed under a server-assigned id.
    Created { id: EntityId, data: EntityData },
    /// The net change from the confirmed state was zero; nothing was sent.
    Unchanged,
    /// The backend deleted the record.
    Deleted,
}

impl MutationOutcome {
    /// The confirmed state, unless nothing was written.
    pub fn data(&self) -> Option<&EntityData> {
        match self {
            MutationOutcome::Confirmed(data) | MutationOutcome::Created { data, .. } => Some(data),
            MutationOutcome::Unchanged | MutationOutcome::Deleted => None,
        }
    }
}

/// Resolves once the write carrying a mutation settles.
///
/// The cache has already been updated by the time this is returned.
/// Dropping it does not cancel anything.
#[must_use = "the outcome reports failures; drop it explicitly to ignore them"]
#[derive(Debug)]
pub struct PendingMutation {
    rx: oneshot::Receiver<MutationResult<MutationOutcome>>,
}

impl PendingMutation {
    fn new(rx: oneshot::Receiver<MutationResult<MutationOutcome>>) -> Self {
        Self { rx }
    }
}

impl Future for PendingMutation {
    type Output = MutationResult<MutationOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(MutationError::Abandoned)))
    }
}

/// One remote call.
struct Attempt {
    key: EntityKey,
    id: Option<EntityId>,
    op: Op,
}

enum Op {
    Upsert(EntityData),
    Delete,
}

enum Ack {
    Written(WriteAck),
    Deleted,
}

type Resolution = (Waiter, MutationResult<MutationOutcome>);

pub(crate) struct Shared {
    pub(crate) cache: EntityCache,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) config: SyncConfig,
    ledger: Mutex<HashMap<EntityKey, PendingKey>>,
    /// Server key → provisional key of every create that has landed. Changes
    /// staged for the server key are mirrored onto the provisional one.
    aliases: Mutex<HashMap<EntityKey, EntityKey>>,
}

impl Shared {
    /// Locks the ledger. Lock order is ledger, aliases, cache; listeners
    /// only ever run after all of them are released.
    pub(crate) fn ledger(&self) -> MutexGuard<'_, HashMap<EntityKey, PendingKey>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn aliases(&self) -> MutexGuard<'_, HashMap<EntityKey, EntityKey>> {
        self.aliases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn alias_of(&self, key: &EntityKey) -> Option<EntityKey> {
        self.aliases().get(key).cloned()
    }

    pub(crate) fn forget_alias(&self, key: &EntityKey) {
        self.aliases().remove(key);
    }

    pub(crate) fn stage_confirmed(&self, key: &EntityKey, data: EntityData) -> CachedEntity {
        self.stage(CachedEntity::new(key.clone(), data, Version::ZERO))
    }

    pub(crate) fn stage_optimistic(&self, key: &EntityKey, data: EntityData) -> CachedEntity {
        self.stage(CachedEntity::new(key.clone(), data, Version::ZERO).unconfirmed())
    }

    fn stage(&self, entity: CachedEntity) -> CachedEntity {
        let stored = self.cache.stage_next(entity);
        if let Some(alias) = self.alias_of(&stored.key) {
            let mut mirrored = CachedEntity::new(alias, stored.data.clone(), Version::ZERO)
                .resolved_to(stored.key.id.clone());
            mirrored.confirmed = stored.confirmed;
            self.cache.stage_next(mirrored);
        }
        stored
    }

    /// Evicts `key` and its provisional alias, if any, without delivering.
    pub(crate) fn stage_evict(&self, key: &EntityKey) -> bool {
        let evicted = self.cache.stage_evict(key);
        if let Some(alias) = self.alias_of(key) {
            self.cache.stage_evict(&alias);
        }
        evicted
    }

    async fn send(&self, attempt: &Attempt) -> RemoteResult<Ack> {
        let kind = attempt.key.kind;
        let call = async {
            match (&attempt.op, attempt.id.as_ref()) {
                (Op::Upsert(payload), id) => {
                    self.remote.write(kind, id, payload).await.map(Ack::Written)
                }
                (Op::Delete, Some(id)) => self.remote.delete(kind, id).await.map(|()| Ack::Deleted),
                // never reached the backend
                (Op::Delete, None) => Ok(Ack::Deleted),
            }
        };
        match self.config.write_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(RemoteError::Timeout)),
            None => call.await,
        }
    }

    /// Reconciles the ledger and cache with the result of `attempt`.
    /// Returns the follow-up write for the same key, if one is needed.
    fn settle(&self, attempt: Attempt, result: RemoteResult<Ack>) -> Option<Attempt> {
        let mut resolved: Vec<Resolution> = Vec::new();
        let next = {
            let mut ledger = self.ledger();
            let Some(mut pending) = ledger.remove(&attempt.key) else {
                warn!("Write for {} settled with no pending entry", attempt.key);
                return None;
            };
            let mut key = attempt.key;

            match result {
                Ok(Ack::Deleted) => {
                    debug!("Delete of {} confirmed", key);
                    self.forget_alias(&key);
                    resolved.extend(
                        pending
                            .drain_waiters()
                            .into_iter()
                            .map(|waiter| (waiter, Ok(MutationOutcome::Deleted))),
                    );
                    None
                }
                Ok(Ack::Written(ack)) => {
                    let mut base = pending.in_flight_target();
                    if !ack.fields.is_empty() {
                        match base.merge_row(&Value::Object(ack.fields.clone())) {
                            Ok(merged) => base = merged,
                            Err(e) => warn!("Ignoring malformed canonical fields for {}: {}", key, e),
                        }
                    }

                    let outcome = if pending.creating {
                        let server_key = EntityKey::new(key.kind, ack.id.clone());
                        debug!("Create {} landed as {}", key, server_key);
                        self.aliases().insert(server_key.clone(), key.clone());
                        pending.creating = false;
                        pending.remote_id = Some(ack.id.clone());
                        key = server_key;
                        MutationOutcome::Created {
                            id: ack.id,
                            data: base.clone(),
                        }
                    } else {
                        debug!("Write for {} confirmed", key);
                        MutationOutcome::Confirmed(base.clone())
                    };

                    pending.base = base;
                    pending.in_flight.clear();
                    resolved.extend(
                        pending
                            .in_flight_waiters
                            .drain(..)
                            .map(|waiter| (waiter, Ok(outcome.clone()))),
                    );
                    self.advance(&mut ledger, key, pending, &mut resolved)
                }
                Err(error) if pending.creating => {
                    warn!("Create {} failed, discarding it: {}", key, error);
                    self.cache.stage_evict(&key);
                    for waiter in pending.drain_waiters() {
                        resolved.push((waiter, Err(failed(&key, &error))));
                    }
                    None
                }
                Err(error) => {
                    if pending.deleting {
                        warn!("Delete of {} failed, restoring it: {}", key, error);
                    } else {
                        warn!("Write for {} failed, rolling back: {}", key, error);
                    }
                    pending.deleting = false;
                    pending.in_flight.clear();
                    for waiter in pending.in_flight_waiters.drain(..) {
                        resolved.push((waiter, Err(failed(&key, &error))));
                    }
                    self.advance(&mut ledger, key, pending, &mut resolved)
                }
            }
        };

        self.cache.deliver();
        for (waiter, result) in resolved {
            let _ = waiter.send(result);
        }
        next
    }

    /// Decides what follows a settled write: idle with the confirmed state,
    /// a queued delete, or one more write carrying everything queued
    /// meanwhile.
    fn advance(
        &self,
        ledger: &mut HashMap<EntityKey, PendingKey>,
        key: EntityKey,
        mut pending: PendingKey,
        resolved: &mut Vec<Resolution>,
    ) -> Option<Attempt> {
        if pending.delete_queued {
            // mutations queued ahead of the delete are superseded by it
            debug!("Sending queued delete of {}", key);
            pending.delete_queued = false;
            pending.deleting = true;
            pending.queued.clear();
            pending.in_flight_waiters = std::mem::take(&mut pending.queued_waiters);
            let id = pending.remote_id.clone();
            ledger.insert(key.clone(), pending);
            return Some(Attempt {
                key,
                id,
                op: Op::Delete,
            });
        }

        if pending.queued.is_empty() {
            self.stage_confirmed(&key, pending.base);
            return None;
        }

        let target = fold(&pending.queued, &pending.base);
        if target == pending.base {
            debug!("Queued mutations of {} cancel out, nothing to send", key);
            resolved.extend(
                pending
                    .queued_waiters
                    .drain(..)
                    .map(|waiter| (waiter, Ok(MutationOutcome::Unchanged))),
            );
            self.stage_confirmed(&key, pending.base);
            return None;
        }

        debug!(
            "Sending {} coalesced mutation(s) of {}",
            pending.queued.len(),
            key
        );
        pending.in_flight = std::mem::take(&mut pending.queued);
        pending.in_flight_waiters = std::mem::take(&mut pending.queued_waiters);
        self.stage_optimistic(&key, target.clone());
        let id = pending.remote_id.clone();
        ledger.insert(key.clone(), pending);
        Some(Attempt {
            key,
            id,
            op: Op::Upsert(target),
        })
    }
}

fn failed(key: &EntityKey, error: &RemoteError) -> MutationError {
    MutationError::MutationFailed {
        key: key.clone(),
        source: error.clone(),
    }
}

async fn drive(shared: Arc<Shared>, mut attempt: Attempt) {
    loop {
        let result = shared.send(&attempt).await;
        match shared.settle(attempt, result) {
            Some(next) => attempt = next,
            None => break,
        }
    }
}

/// Turns user intents into immediate cache updates and ordered remote
/// writes.
///
/// Clones share state. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct OptimisticMutator {
    shared: Arc<Shared>,
}

impl OptimisticMutator {
    pub fn new(cache: EntityCache, remote: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                remote,
                config,
                ledger: Mutex::new(HashMap::new()),
                aliases: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The cache this mutator writes to.
    pub fn cache(&self) -> &EntityCache {
        &self.shared.cache
    }

    /// A bridge that merges realtime pushes with this mutator's
    /// outstanding writes.
    pub fn bridge(&self) -> SubscriptionBridge {
        SubscriptionBridge::new(self.shared.clone())
    }

    /// Returns true if a write for `key` has not settled yet.
    pub fn in_flight(&self, key: &EntityKey) -> bool {
        self.shared.ledger().contains_key(key)
    }

    /// Keys with an outstanding write, in no particular order.
    pub fn pending_keys(&self) -> Vec<EntityKey> {
        self.shared.ledger().keys().cloned().collect()
    }

    /// Applies a user intent to `key`.
    pub fn apply_intent(&self, key: &EntityKey, intent: Intent) -> MutationResult<PendingMutation> {
        if !intent.accepts(key.kind) {
            return Err(MutationError::IntentMismatch {
                intent: intent.to_string(),
                kind: key.kind,
            });
        }
        self.apply(key, intent.into_mutation())
    }

    /// Applies `op` to the cached state of `key`.
    ///
    /// On return every listener of `key` has seen the new state, marked
    /// unconfirmed (when called from inside a cache listener, right after
    /// that listener returns). If a write for `key` is already in flight, `op` is
    /// queued behind it. If nothing is in flight and `op` does not change
    /// the confirmed state, no write is made and the returned future
    /// resolves to [`MutationOutcome::Unchanged`].
    ///
    /// Keys of provisional entries whose create has landed are redirected to
    /// the server id.
    pub fn apply(&self, key: &EntityKey, op: Mutation) -> MutationResult<PendingMutation> {
        let runtime = Handle::try_current().map_err(|_| MutationError::NoRuntime)?;
        let (tx, rx) = oneshot::channel();

        let attempt = {
            let mut ledger = self.shared.ledger();
            let (key, current) = self.resolve(key)?;
            let shown = match ledger.get(&key) {
                Some(pending) => pending.display(),
                None => current.data.clone(),
            };
            let next = op(&shown);
            if next.kind() != key.kind {
                return Err(MutationError::KindMismatch {
                    expected: key.kind,
                    found: next.kind(),
                });
            }

            if let Some(pending) = ledger.get_mut(&key) {
                debug!("Queueing mutation of {} behind in-flight write", key);
                pending.queue(op, tx);
                self.shared.stage_optimistic(&key, next);
                None
            } else if next == current.data {
                debug!("Mutation of {} is a no-op, nothing to send", key);
                let _ = tx.send(Ok(MutationOutcome::Unchanged));
                None
            } else {
                debug!("Applying mutation of {}", key);
                ledger.insert(
                    key.clone(),
                    PendingKey::new(current.data, Some(key.id.clone()), op, tx),
                );
                self.shared.stage_optimistic(&key, next.clone());
                Some(Attempt {
                    id: Some(key.id.clone()),
                    key,
                    op: Op::Upsert(next),
                })
            }
        };

        self.shared.cache.deliver();
        if let Some(attempt) = attempt {
            runtime.spawn(drive(self.shared.clone(), attempt));
        }
        Ok(PendingMutation::new(rx))
    }

    /// Optimistically creates a record under a provisional id.
    ///
    /// The entry is visible immediately. When the backend acknowledges, the
    /// confirmed record is stored under the server key and the provisional
    /// entry is marked with the server id; from then on it follows every
    /// change to the server key. If the create fails, the provisional entry
    /// is evicted.
    pub fn create(&self, data: EntityData) -> MutationResult<(EntityKey, PendingMutation)> {
        let runtime = Handle::try_current().map_err(|_| MutationError::NoRuntime)?;
        let key = EntityKey::new(data.kind(), EntityId::provisional());
        let (tx, rx) = oneshot::channel();

        {
            let mut ledger = self.shared.ledger();
            ledger.insert(
                key.clone(),
                PendingKey::new(data.clone(), None, mutation(EntityData::clone), tx),
            );
            self.shared.stage_optimistic(&key, data.clone());
        }
        debug!("Creating {}", key);

        self.shared.cache.deliver();
        runtime.spawn(drive(
            self.shared.clone(),
            Attempt {
                key: key.clone(),
                id: None,
                op: Op::Upsert(data),
            },
        ));
        Ok((key, PendingMutation::new(rx)))
    }

    /// Optimistically deletes `key`.
    ///
    /// The entry is evicted before this returns. If a write for `key` is in
    /// flight the delete is sent after it settles, superseding anything
    /// queued meanwhile. If the backend refuses the delete, the last
    /// confirmed state is put back.
    pub fn delete(&self, key: &EntityKey) -> MutationResult<PendingMutation> {
        let runtime = Handle::try_current().map_err(|_| MutationError::NoRuntime)?;
        let (tx, rx) = oneshot::channel();

        let attempt = {
            let mut ledger = self.shared.ledger();
            let (key, current) = self.resolve(key)?;
            let attempt = match ledger.get_mut(&key) {
                Some(pending) => {
                    debug!("Queueing delete of {} behind in-flight write", key);
                    pending.queue_delete(tx);
                    None
                }
                None => {
                    debug!("Deleting {}", key);
                    ledger.insert(
                        key.clone(),
                        PendingKey::deleting(current.data, key.id.clone(), tx),
                    );
                    Some(Attempt {
                        id: Some(key.id.clone()),
                        key: key.clone(),
                        op: Op::Delete,
                    })
                }
            };
            self.shared.stage_evict(&key);
            attempt
        };

        self.shared.cache.deliver();
        if let Some(attempt) = attempt {
            runtime.spawn(drive(self.shared.clone(), attempt));
        }
        Ok(PendingMutation::new(rx))
    }

    fn resolve(&self, key: &EntityKey) -> MutationResult<(EntityKey, CachedEntity)> {
        let current = self.shared.cache.require(key)?;
        match &current.resolved_id {
            Some(id) => {
                let server_key = EntityKey::new(key.kind, id.clone());
                let resolved = self.shared.cache.require(&server_key)?;
                Ok((server_key, resolved))
            }
            None => Ok((key.clone(), current)),
        }
    }
}

impl std::fmt::Debug for OptimisticMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMutator")
            .field("cache", &self.shared.cache)
            .field("config", &self.shared.config)
            .field("pending", &self.shared.ledger().len())
            .finish()
    }
}
