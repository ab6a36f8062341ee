//! Remote store abstraction.
//!
//! The backend (auth, tables, realtime channels) is an external
//! collaborator. The sync core only needs a few capabilities from it: a
//! row-level write that echoes canonical fields, a row delete, and a
//! realtime subscription that pushes changed rows into a channel.

use crate::error::RemoteResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use summit_model::{EntityData, RowChange};
use summit_types::{EntityId, EntityKind};
use tokio::sync::mpsc;

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteAck {
    /// The server's id for the row (assigned by the server on creates).
    pub id: EntityId,
    /// Canonical columns the server echoed back, e.g. `likes_count`.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl WriteAck {
    /// An acknowledgement with no canonical fields.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Adds one canonical field.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// A row change pushed by the backend's realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// Backend table name, e.g. `posts`.
    pub table: String,
    pub change: RowChange,
    /// The new row (or, for deletes, the old one).
    pub row: Value,
    /// The backend's own ordering hint. Logged, never trusted for ordering.
    #[serde(default)]
    pub version_hint: Option<u64>,
}

impl RemoteEvent {
    pub fn new(kind: EntityKind, change: RowChange, row: Value) -> Self {
        Self {
            table: kind.table_name().to_string(),
            change,
            row,
            version_hint: None,
        }
    }
}

/// Which rows of a table a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionFilter {
    All,
    /// Rows whose `column` equals `value` (`column=eq.value`).
    Eq { column: String, value: String },
}

impl SubscriptionFilter {
    pub fn eq(column: &str, value: &str) -> Self {
        SubscriptionFilter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Returns true if `row` passes this filter.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Eq { column, value } => match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(Value::Number(n)) => n.to_string() == *value,
                _ => false,
            },
        }
    }
}

/// Opaque handle to an active realtime subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// The backend as seen by the sync core.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Makes the backend reflect `payload` for the row `id` of `kind`.
    /// `id` is `None` for creates.
    async fn write(
        &self,
        kind: EntityKind,
        id: Option<&EntityId>,
        payload: &EntityData,
    ) -> RemoteResult<WriteAck>;

    /// Deletes the row `id` of `kind`. Deleting a row that is already gone
    /// succeeds.
    async fn delete(&self, kind: EntityKind, id: &EntityId) -> RemoteResult<()>;

    /// Starts pushing changes to rows of `kind` that pass `filter` into
    /// `sink`, in the order the backend emits them.
    async fn subscribe(
        &self,
        kind: EntityKind,
        filter: SubscriptionFilter,
        sink: mpsc::Sender<RemoteEvent>,
    ) -> RemoteResult<SubscriptionHandle>;

    /// Stops a subscription and drops its sink. Unknown handles are ignored.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> RemoteResult<()>;
}

/// A scriptable remote store for testing.
pub mod mock {
    use super::*;
    use crate::error::RemoteError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use tokio::sync::oneshot;

    /// One write as the mock received it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct WriteRecord {
        pub kind: EntityKind,
        pub id: Option<EntityId>,
        pub payload: EntityData,
        /// The payload as the row the backend would store.
        pub row: Value,
    }

    /// One delete as the mock received it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DeleteRecord {
        pub kind: EntityKind,
        pub id: EntityId,
    }

    /// A write parked until the test decides its outcome.
    #[derive(Debug)]
    pub struct ParkedWrite {
        pub record: WriteRecord,
        reply: oneshot::Sender<RemoteResult<WriteAck>>,
    }

    impl ParkedWrite {
        /// Acknowledges with the row's id (or `srv-<n>` for creates) and
        /// the given canonical fields.
        pub fn succeed(self, fields: Value) -> WriteAck {
            let id = self
                .record
                .id
                .clone()
                .unwrap_or_else(|| EntityId::new(format!("srv-{}", next_server_id())));
            let ack = WriteAck {
                id,
                fields: fields.as_object().cloned().unwrap_or_default(),
            };
            let _ = self.reply.send(Ok(ack.clone()));
            ack
        }

        /// Acknowledges with an explicit ack.
        pub fn succeed_with(self, ack: WriteAck) {
            let _ = self.reply.send(Ok(ack));
        }

        /// Fails the write.
        pub fn fail(self, error: RemoteError) {
            let _ = self.reply.send(Err(error));
        }
    }

    /// A delete parked until the test decides its outcome.
    #[derive(Debug)]
    pub struct ParkedDelete {
        pub record: DeleteRecord,
        reply: oneshot::Sender<RemoteResult<()>>,
    }

    impl ParkedDelete {
        pub fn succeed(self) {
            let _ = self.reply.send(Ok(()));
        }

        pub fn fail(self, error: RemoteError) {
            let _ = self.reply.send(Err(error));
        }
    }

    fn next_server_id() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    type Responder = Box<dyn Fn(&WriteRecord) -> RemoteResult<WriteAck> + Send + Sync>;

    struct Subscriber {
        kind: EntityKind,
        filter: SubscriptionFilter,
        sink: mpsc::Sender<RemoteEvent>,
    }

    #[derive(Default)]
    struct MockState {
        writes: Vec<WriteRecord>,
        deletes: Vec<DeleteRecord>,
        subscribers: HashMap<u64, Subscriber>,
        next_handle: u64,
    }

    /// In-memory [`RemoteStore`].
    ///
    /// By default every write and delete is parked: the test takes it with
    /// [`next_write`](Self::next_write) or [`next_delete`](Self::next_delete)
    /// and resolves it, which gives full control over interleavings.
    /// [`with_responder`](Self::with_responder) answers writes immediately
    /// instead, and acknowledges every delete.
    pub struct MockRemoteStore {
        state: Arc<Mutex<MockState>>,
        responder: Option<Responder>,
        parked_tx: mpsc::UnboundedSender<ParkedWrite>,
        parked_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ParkedWrite>>,
        deletes_tx: mpsc::UnboundedSender<ParkedDelete>,
        deletes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ParkedDelete>>,
    }

    impl Default for MockRemoteStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockRemoteStore {
        /// A store that parks every write.
        pub fn new() -> Self {
            let (parked_tx, parked_rx) = mpsc::unbounded_channel();
            let (deletes_tx, deletes_rx) = mpsc::unbounded_channel();
            Self {
                state: Arc::new(Mutex::new(MockState::default())),
                responder: None,
                parked_tx,
                parked_rx: tokio::sync::Mutex::new(parked_rx),
                deletes_tx,
                deletes_rx: tokio::sync::Mutex::new(deletes_rx),
            }
        }

        fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// A store that answers every write with `responder`.
        pub fn with_responder<F>(responder: F) -> Self
        where
            F: Fn(&WriteRecord) -> RemoteResult<WriteAck> + Send + Sync + 'static,
        {
            Self {
                responder: Some(Box::new(responder)),
                ..Self::new()
            }
        }

        /// Waits for the next parked write.
        pub async fn next_write(&self) -> Option<ParkedWrite> {
            self.parked_rx.lock().await.recv().await
        }

        /// Takes a parked write if one is waiting.
        pub fn try_next_write(&self) -> Option<ParkedWrite> {
            self.parked_rx.try_lock().ok()?.try_recv().ok()
        }

        /// Waits for the next parked delete.
        pub async fn next_delete(&self) -> Option<ParkedDelete> {
            self.deletes_rx.lock().await.recv().await
        }

        /// Takes a parked delete if one is waiting.
        pub fn try_next_delete(&self) -> Option<ParkedDelete> {
            self.deletes_rx.try_lock().ok()?.try_recv().ok()
        }

        /// Every write received so far, in order.
        pub fn writes(&self) -> Vec<WriteRecord> {
            self.state().writes.clone()
        }

        /// Number of writes received so far.
        pub fn write_count(&self) -> usize {
            self.state().writes.len()
        }

        /// Every delete received so far, in order.
        pub fn deletes(&self) -> Vec<DeleteRecord> {
            self.state().deletes.clone()
        }

        /// Number of live subscriptions.
        pub fn subscriber_count(&self) -> usize {
            self.state().subscribers.len()
        }

        /// Delivers `event` to every matching subscriber. Returns how many
        /// received it.
        pub async fn push(&self, event: RemoteEvent) -> usize {
            let sinks: Vec<_> = {
                let state = self.state();
                state
                    .subscribers
                    .values()
                    .filter(|s| s.kind.table_name() == event.table && s.filter.matches(&event.row))
                    .map(|s| s.sink.clone())
                    .collect()
            };
            let mut delivered = 0;
            for sink in sinks {
                if sink.send(event.clone()).await.is_ok() {
                    delivered += 1;
                }
            }
            delivered
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn write(
            &self,
            kind: EntityKind,
            id: Option<&EntityId>,
            payload: &EntityData,
        ) -> RemoteResult<WriteAck> {
            let row = payload.to_row().map_err(|e| RemoteError::Rejected {
                code: "22P02".into(),
                message: e.to_string(),
            })?;
            let record = WriteRecord {
                kind,
                id: id.cloned(),
                payload: payload.clone(),
                row,
            };
            self.state().writes.push(record.clone());

            if let Some(responder) = &self.responder {
                return responder(&record);
            }

            let (reply, outcome) = oneshot::channel();
            self.parked_tx
                .send(ParkedWrite { record, reply })
                .map_err(|_| RemoteError::Network("mock store closed".into()))?;
            outcome
                .await
                .unwrap_or_else(|_| Err(RemoteError::Network("write dropped by test".into())))
        }

        async fn delete(&self, kind: EntityKind, id: &EntityId) -> RemoteResult<()> {
            let record = DeleteRecord {
                kind,
                id: id.clone(),
            };
            self.state().deletes.push(record.clone());

            if self.responder.is_some() {
                return Ok(());
            }

            let (reply, outcome) = oneshot::channel();
            self.deletes_tx
                .send(ParkedDelete { record, reply })
                .map_err(|_| RemoteError::Network("mock store closed".into()))?;
            outcome
                .await
                .unwrap_or_else(|_| Err(RemoteError::Network("delete dropped by test".into())))
        }

        async fn subscribe(
            &self,
            kind: EntityKind,
            filter: SubscriptionFilter,
            sink: mpsc::Sender<RemoteEvent>,
        ) -> RemoteResult<SubscriptionHandle> {
            let mut state = self.state();
            state.next_handle += 1;
            let handle = state.next_handle;
            state.subscribers.insert(handle, Subscriber { kind, filter, sink });
            Ok(SubscriptionHandle(handle))
        }

        async fn unsubscribe(&self, handle: SubscriptionHandle) -> RemoteResult<()> {
            self.state().subscribers.remove(&handle.0);
            Ok(())
        }
    }
}
