//! Per-key bookkeeping for outstanding mutations.

use crate::error::MutationResult;
use crate::mutator::MutationOutcome;
use summit_model::{EntityData, Mutation};
use summit_types::EntityId;
use tokio::sync::oneshot;

pub(crate) type Waiter = oneshot::Sender<MutationResult<MutationOutcome>>;

/// Everything the mutator knows about one key with an outstanding write.
///
/// The displayed state is always `queued ∘ in_flight ∘ base`. A realtime
/// push replaces `base` and the display is recomputed, so fields owned by
/// the outstanding mutations keep their local values while everything else
/// takes the pushed values.
pub(crate) struct PendingKey {
    /// Last state acknowledged by the backend.
    pub base: EntityData,
    /// Backend id. `None` until a create is acknowledged.
    pub remote_id: Option<EntityId>,
    /// True while the first write of an optimistic create is outstanding.
    pub creating: bool,
    /// True while the outstanding remote call is a delete.
    pub deleting: bool,
    /// A delete waits behind the outstanding write. Its waiter is the last
    /// of `queued_waiters`.
    pub delete_queued: bool,
    pub in_flight: Vec<Mutation>,
    pub in_flight_waiters: Vec<Waiter>,
    pub queued: Vec<Mutation>,
    pub queued_waiters: Vec<Waiter>,
}

impl PendingKey {
    pub fn new(base: EntityData, remote_id: Option<EntityId>, op: Mutation, waiter: Waiter) -> Self {
        Self {
            base,
            creating: remote_id.is_none(),
            deleting: false,
            delete_queued: false,
            remote_id,
            in_flight: vec![op],
            in_flight_waiters: vec![waiter],
            queued: Vec::new(),
            queued_waiters: Vec::new(),
        }
    }

    /// A key whose delete is being sent right away.
    pub fn deleting(base: EntityData, remote_id: EntityId, waiter: Waiter) -> Self {
        Self {
            base,
            remote_id: Some(remote_id),
            creating: false,
            deleting: true,
            delete_queued: false,
            in_flight: Vec::new(),
            in_flight_waiters: vec![waiter],
            queued: Vec::new(),
            queued_waiters: Vec::new(),
        }
    }

    pub fn queue(&mut self, op: Mutation, waiter: Waiter) {
        self.queued.push(op);
        self.queued_waiters.push(waiter);
    }

    pub fn queue_delete(&mut self, waiter: Waiter) {
        self.delete_queued = true;
        self.queued_waiters.push(waiter);
    }

    /// True once the key has been deleted locally. Its entry stays out of
    /// the cache until the delete settles.
    pub fn removed(&self) -> bool {
        self.deleting || self.delete_queued
    }

    /// State the in-flight write asks the backend to reach.
    pub fn in_flight_target(&self) -> EntityData {
        fold(&self.in_flight, &self.base)
    }

    /// State every view should show.
    pub fn display(&self) -> EntityData {
        fold(&self.queued, &self.in_flight_target())
    }

    /// Every waiter, in-flight first.
    pub fn drain_waiters(&mut self) -> Vec<Waiter> {
        let mut all = std::mem::take(&mut self.in_flight_waiters);
        all.append(&mut self.queued_waiters);
        all
    }
}

pub(crate) fn fold(ops: &[Mutation], base: &EntityData) -> EntityData {
    ops.iter().fold(base.clone(), |state, op| op(&state))
}
