//! The entity cache and its listener registry.

use crate::entity::{CacheChange, CachedEntity, PutOutcome};
use crate::error::{CacheError, CacheResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use summit_model::EntityData;
use summit_types::{EntityKey, EntityKind, Version};
use tracing::{debug, trace};

/// Callback invoked for every accepted change to a subscribed key.
pub type Listener = Arc<dyn Fn(&CacheChange) + Send + Sync>;

#[derive(Default)]
struct Inner {
    entries: HashMap<EntityKey, CachedEntity>,
    /// Last version of evicted keys, so later writes still move forward.
    retired: HashMap<EntityKey, Version>,
    refs: HashMap<EntityKey, usize>,
    listeners: HashMap<EntityKey, Vec<(u64, Listener)>>,
    next_listener_id: u64,
    outbox: VecDeque<Staged>,
    /// Threads currently inside [`EntityCache::deliver`].
    delivering: HashSet<ThreadId>,
    /// Keys whose listeners are running, with the thread that staged the
    /// change being delivered.
    busy: HashMap<EntityKey, ThreadId>,
}

/// A change waiting for delivery and the thread that staged it.
struct Staged {
    change: CacheChange,
    origin: ThreadId,
}

impl Inner {
    fn version_of(&self, key: &EntityKey) -> Version {
        self.entries
            .get(key)
            .map(|e| e.version)
            .or_else(|| self.retired.get(key).copied())
            .unwrap_or(Version::ZERO)
    }

    fn push(&mut self, change: CacheChange) {
        self.outbox.push_back(Staged {
            change,
            origin: thread::current().id(),
        });
    }

    fn store(&mut self, entity: CachedEntity) {
        self.retired.remove(&entity.key);
        self.push(CacheChange::Updated(entity.clone()));
        self.entries.insert(entity.key.clone(), entity);
    }

    fn drop_entry(&mut self, key: &EntityKey) -> bool {
        self.refs.remove(key);
        match self.entries.remove(key) {
            Some(entity) => {
                self.retired.insert(key.clone(), entity.version);
                self.push(CacheChange::Evicted(key.clone()));
                true
            }
            None => false,
        }
    }

    /// Takes the oldest staged change whose key no other delivery is
    /// working on, marks its key busy and returns it with its listeners.
    fn take_deliverable(&mut self) -> Option<(CacheChange, Vec<Listener>)> {
        let index = self
            .outbox
            .iter()
            .position(|staged| !self.busy.contains_key(staged.change.key()))?;
        let staged = self.outbox.remove(index)?;
        let key = staged.change.key().clone();
        let listeners = self
            .listeners
            .get(&key)
            .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        self.busy.insert(key, staged.origin);
        Some((staged.change, listeners))
    }

    /// True while a change staged by `thread` has not reached its listeners.
    fn owes(&self, thread: ThreadId) -> bool {
        self.outbox.iter().any(|staged| staged.origin == thread)
            || self.busy.values().any(|origin| *origin == thread)
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<Inner>,
    /// Signalled whenever a key stops being busy.
    settled: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared, cloneable handle to the entity cache.
///
/// Clones share state. Create one per session (or per test) and pass it to
/// the mutator, the bridge, and the views; there is no global instance.
#[derive(Clone, Default)]
pub struct EntityCache {
    shared: Arc<Shared>,
}

impl EntityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Returns the current entry for `key`, if loaded.
    pub fn get(&self, key: &EntityKey) -> Option<CachedEntity> {
        self.lock().entries.get(key).cloned()
    }

    /// Like [`get`](Self::get), but absence is an error.
    pub fn require(&self, key: &EntityKey) -> CacheResult<CachedEntity> {
        self.get(key).ok_or_else(|| CacheError::NotFound(key.clone()))
    }

    /// Returns true if `key` is loaded.
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Current version of `key`, including evicted keys; zero if never seen.
    pub fn version(&self, key: &EntityKey) -> Version {
        self.lock().version_of(key)
    }

    /// All loaded entries of one kind, ordered by id.
    pub fn entities(&self, kind: EntityKind) -> Vec<CachedEntity> {
        let mut out: Vec<_> = self
            .lock()
            .entries
            .values()
            .filter(|e| e.key.kind == kind)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.id.cmp(&b.key.id));
        out
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Stores `entity` if its version supersedes the stored one and notifies
    /// listeners before returning.
    pub fn put(&self, entity: CachedEntity) -> PutOutcome {
        let outcome = self.stage(entity);
        self.deliver();
        outcome
    }

    /// Read-through load of a backend record: confirmed, next version.
    pub fn load(&self, key: EntityKey, data: EntityData) -> CachedEntity {
        let stored = self.stage_next(CachedEntity::new(key, data, Version::ZERO));
        self.deliver();
        stored
    }

    /// Applies the version check and stores `entity` without notifying
    /// listeners. Callers must follow with [`deliver`](Self::deliver).
    ///
    /// This lets a caller that holds its own lock update the cache as part
    /// of its critical section and run listeners after releasing it.
    pub fn stage(&self, entity: CachedEntity) -> PutOutcome {
        let mut inner = self.lock();
        let current = inner.version_of(&entity.key);
        if !entity.version.supersedes(current) {
            trace!(
                "Dropping stale write to {} ({} <= {})",
                entity.key, entity.version, current
            );
            return PutOutcome::Stale;
        }
        inner.store(entity);
        PutOutcome::Accepted
    }

    /// Stamps `entity` with the next version for its key and stages it.
    /// Never stale. Returns the stored entry.
    pub fn stage_next(&self, mut entity: CachedEntity) -> CachedEntity {
        let mut inner = self.lock();
        entity.version = inner.version_of(&entity.key).next();
        inner.store(entity.clone());
        entity
    }

    /// Delivers staged changes to their listeners, in staging order per key.
    ///
    /// Listeners run without any cache lock held, so they may read or write
    /// the cache. A write made from inside a listener is queued and
    /// delivered by the outer call once the current listener returns.
    ///
    /// Several threads may deliver at once; a key's listeners only ever run
    /// on one of them at a time. On return every change staged by the
    /// calling thread has reached its listeners, unless the call was made
    /// from inside a listener.
    pub fn deliver(&self) {
        let me = thread::current().id();
        if !self.lock().delivering.insert(me) {
            return;
        }
        let _delivering = DeliveryGuard {
            shared: &self.shared,
            thread: me,
        };

        loop {
            let next = {
                let mut inner = self.lock();
                loop {
                    if let Some(next) = inner.take_deliverable() {
                        break Some(next);
                    }
                    if !inner.owes(me) {
                        break None;
                    }
                    inner = self
                        .shared
                        .settled
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            };
            let Some((change, listeners)) = next else {
                break;
            };
            let _busy = BusyKey {
                shared: &self.shared,
                key: change.key().clone(),
            };
            for listener in listeners {
                listener(&change);
            }
        }
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Registers `listener` for every accepted change to `key`.
    ///
    /// The returned [`Subscription`] unregisters the listener when dropped;
    /// views hold it for exactly as long as they are mounted.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, key: EntityKey, listener: F) -> Subscription
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner
            .listeners
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            cache: Arc::downgrade(&self.shared),
            key,
            id,
        }
    }

    /// Number of listeners registered for `key`.
    pub fn listener_count(&self, key: &EntityKey) -> usize {
        self.lock().listeners.get(key).map_or(0, Vec::len)
    }

    // ── Lifetime ─────────────────────────────────────────────────

    /// Records one more view referencing `key`. Returns the new count.
    pub fn retain(&self, key: &EntityKey) -> usize {
        let mut inner = self.lock();
        let refs = inner.refs.entry(key.clone()).or_insert(0);
        *refs += 1;
        *refs
    }

    /// Releases one view's reference to `key`; evicts the entry when no
    /// references remain. Returns true if the entry was evicted.
    pub fn remove(&self, key: &EntityKey) -> bool {
        let evicted = {
            let mut inner = self.lock();
            let remaining = match inner.refs.get_mut(key) {
                Some(refs) => {
                    *refs = refs.saturating_sub(1);
                    *refs
                }
                None => 0,
            };
            remaining == 0 && inner.drop_entry(key)
        };
        if evicted {
            debug!("Evicted {} (no remaining references)", key);
            self.deliver();
        }
        evicted
    }

    /// Evicts `key` regardless of references.
    pub fn evict(&self, key: &EntityKey) -> bool {
        let evicted = self.stage_evict(key);
        if evicted {
            self.deliver();
        }
        evicted
    }

    /// Evicts `key` without notifying listeners. Callers must follow with
    /// [`deliver`](Self::deliver).
    pub fn stage_evict(&self, key: &EntityKey) -> bool {
        self.lock().drop_entry(key)
    }
}

/// Removes the calling thread from the delivering set, also when a
/// listener panics.
struct DeliveryGuard<'a> {
    shared: &'a Shared,
    thread: ThreadId,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().delivering.remove(&self.thread);
    }
}

/// Releases a key once its listeners have run and wakes waiting deliveries.
struct BusyKey<'a> {
    shared: &'a Shared,
    key: EntityKey,
}

impl Drop for BusyKey<'_> {
    fn drop(&mut self) {
        self.shared.lock().busy.remove(&self.key);
        self.shared.settled.notify_all();
    }
}

/// Handle to a registered listener. Dropping it unregisters the listener.
pub struct Subscription {
    cache: Weak<Shared>,
    key: EntityKey,
    id: u64,
}

impl Subscription {
    /// The key this subscription watches.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Unregisters the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.cache.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        if let Some(listeners) = inner.listeners.get_mut(&self.key) {
            listeners.retain(|(id, _)| *id != self.id);
            if listeners.is_empty() {
                inner.listeners.remove(&self.key);
            }
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EntityCache")
            .field("entries", &inner.entries.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
