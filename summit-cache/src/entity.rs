use serde::{Deserialize, Serialize};
use summit_model::EntityData;
use summit_types::{EntityId, EntityKey, Version};

/// One cached record and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntity {
    pub key: EntityKey,
    pub data: EntityData,
    pub version: Version,
    /// False while a remote write for this key has not resolved.
    pub confirmed: bool,
    /// Server-assigned id, set on a provisional entry once its create lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<EntityId>,
}

impl CachedEntity {
    /// Creates a confirmed entry.
    #[must_use]
    pub fn new(key: EntityKey, data: EntityData, version: Version) -> Self {
        Self {
            key,
            data,
            version,
            confirmed: true,
            resolved_id: None,
        }
    }

    /// Marks this entry as carrying an unacknowledged local change.
    #[must_use]
    pub fn unconfirmed(mut self) -> Self {
        self.confirmed = false;
        self
    }

    /// Sets the server-assigned id of a provisional entry.
    #[must_use]
    pub fn resolved_to(mut self, id: EntityId) -> Self {
        self.resolved_id = Some(id);
        self
    }
}

/// Result of a write to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The write was stored and listeners will be notified.
    Accepted,
    /// The write carried a version not greater than the stored one and was
    /// dropped. Not an error.
    Stale,
}

impl PutOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, PutOutcome::Accepted)
    }
}

/// A change delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    Updated(CachedEntity),
    Evicted(EntityKey),
}

impl CacheChange {
    /// The key this change applies to.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        match self {
            CacheChange::Updated(entity) => &entity.key,
            CacheChange::Evicted(key) => key,
        }
    }

    /// The new entry, unless this change is an eviction.
    #[must_use]
    pub fn entity(&self) -> Option<&CachedEntity> {
        match self {
            CacheChange::Updated(entity) => Some(entity),
            CacheChange::Evicted(_) => None,
        }
    }
}
