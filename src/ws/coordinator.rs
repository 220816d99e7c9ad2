//! Throttled fan-out of full batch snapshots to every live channel.
//!
//! Mutations call [`BroadcastCoordinator::notify_mutation`]. The first call
//! opens a broadcast window; calls made while the window is open are absorbed.
//! When the window closes the coordinator reads the store once and pushes the
//! same snapshot frame to every registered connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::SnapshotSource;
use crate::models::ServerMessage;

/// Identifies one registered live channel
pub type ConnectionId = Uuid;

/// Outbound frame queue of one connection, drained by its socket writer
pub type Outbound = mpsc::Sender<Arc<str>>;

pub const WELCOME_MESSAGE: &str = "Connected to batch live updates";

/// A connection needs room for the welcome and the initial snapshot
const MIN_QUEUE_CAPACITY: usize = 2;

pub struct BroadcastCoordinator {
    store: Arc<dyn SnapshotSource>,
    throttle: Duration,
    queue_capacity: usize,
    connections: Mutex<HashMap<ConnectionId, Outbound>>,
    pending: AtomicBool,
}

impl BroadcastCoordinator {
    pub fn new(store: Arc<dyn SnapshotSource>, throttle: Duration, queue_capacity: usize) -> Arc<Self> {
        info!(
            "Broadcast coordinator initialized with {:?} throttle and queue capacity {}",
            throttle, queue_capacity
        );
        Arc::new(Self {
            store,
            throttle,
            queue_capacity: queue_capacity.max(MIN_QUEUE_CAPACITY),
            connections: Mutex::new(HashMap::new()),
            pending: AtomicBool::new(false),
        })
    }

    /// Capacity to use when creating a connection's outbound queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Add a connection and push the welcome frame and the current snapshot to it.
    ///
    /// The registry lock is held across the snapshot read so a concurrent
    /// broadcast cannot deliver an older snapshot after this one.
    pub async fn register(&self, id: ConnectionId, outbound: Outbound) {
        let mut connections = self.connections.lock().await;

        match ServerMessage::welcome(WELCOME_MESSAGE).to_frame() {
            Ok(frame) => {
                if !deliver(&id, &outbound, frame.into()) {
                    return;
                }
            }
            Err(e) => error!(connection_id = %id, "Failed to encode welcome message: {}", e),
        }

        match self.store.snapshot().await {
            Ok(batches) => {
                let count = batches.len();
                match ServerMessage::batch_update(batches).to_frame() {
                    Ok(frame) => {
                        if !deliver(&id, &outbound, frame.into()) {
                            return;
                        }
                        debug!(connection_id = %id, "Sent initial snapshot with {} batches", count);
                    }
                    Err(e) => error!(connection_id = %id, "Failed to encode initial snapshot: {}", e),
                }
            }
            Err(e) => error!(connection_id = %id, "Failed to read initial snapshot: {}", e),
        }

        connections.insert(id, outbound);
        info!(
            connection_id = %id,
            "Live connection registered, total connections: {}",
            connections.len()
        );
    }

    /// Remove a connection. Returns whether it was still registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        let removed = connections.remove(&id).is_some();
        if removed {
            info!(
                connection_id = %id,
                "Live connection unregistered, total connections: {}",
                connections.len()
            );
        }
        removed
    }

    /// Record that the batch table changed.
    ///
    /// Opens a broadcast window unless one is already pending. Never blocks
    /// and never fails.
    pub fn notify_mutation(self: &Arc<Self>) {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Broadcast already pending, mutation coalesced");
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("No runtime available to schedule broadcast: {}", e);
                self.pending.store(false, Ordering::Release);
                return;
            }
        };

        debug!("Broadcast scheduled in {:?}", self.throttle);
        let coordinator = Arc::clone(self);
        handle.spawn(async move {
            tokio::time::sleep(coordinator.throttle).await;
            coordinator.broadcast_now().await;
        });
    }

    /// Read the snapshot and push it to every registered connection.
    ///
    /// Connections whose queue is closed or full are dropped. A failed read
    /// abandons the cycle; the next mutation schedules a new one.
    pub async fn broadcast_now(&self) {
        // Cleared before the read: a mutation racing the read opens a new window.
        self.pending.store(false, Ordering::Release);

        let mut connections = self.connections.lock().await;

        let batches = match self.store.snapshot().await {
            Ok(batches) => batches,
            Err(e) => {
                error!("Broadcast abandoned, failed to read snapshot: {}", e);
                return;
            }
        };
        let count = batches.len();

        let frame: Arc<str> = match ServerMessage::batch_update(batches).to_frame() {
            Ok(frame) => frame.into(),
            Err(e) => {
                error!("Broadcast abandoned, failed to encode snapshot: {}", e);
                return;
            }
        };

        let before = connections.len();
        connections.retain(|id, outbound| deliver(id, outbound, Arc::clone(&frame)));
        let dropped = before - connections.len();

        if dropped > 0 {
            warn!("Dropped {} unresponsive connections during broadcast", dropped);
        }
        debug!(
            "Broadcast snapshot with {} batches to {} connections",
            count,
            connections.len()
        );
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Whether a broadcast window is currently open
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

fn deliver(id: &ConnectionId, outbound: &Outbound, frame: Arc<str>) -> bool {
    match outbound.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(connection_id = %id, "Connection queue full, dropping slow client");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(connection_id = %id, "Connection queue closed, dropping connection");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BatchStore, MemoryBatchStore, StoreError};
    use crate::models::{Batch, BatchStatus, NewBatch};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const THROTTLE: Duration = Duration::from_secs(2);

    /// Snapshot source that counts reads and can be told to fail
    struct CountingStore {
        inner: MemoryBatchStore,
        reads: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingStore {
        fn new(rows: usize) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryBatchStore::with_rows((0..rows).map(row).collect()),
                reads: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            })
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotSource for CountingStore {
        async fn snapshot(&self) -> Result<Vec<Batch>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::NotFound(0));
            }
            self.inner.snapshot().await
        }
    }

    fn row(n: usize) -> NewBatch {
        NewBatch {
            batch_number: format!("BAT-{}", n),
            article_number: "ART".to_string(),
            description: "Motordelar M-200".to_string(),
            location: None,
            total_weight: 45,
        }
    }

    fn decode(frame: &str) -> ServerMessage {
        ServerMessage::from_frame(frame).unwrap()
    }

    fn snapshot_len(frame: &str) -> usize {
        match decode(frame) {
            ServerMessage::BatchUpdate { data, .. } => data.len(),
            other => panic!("expected batch_update, got {:?}", other),
        }
    }

    async fn connect(
        coordinator: &Arc<BroadcastCoordinator>,
    ) -> (ConnectionId, mpsc::Receiver<Arc<str>>) {
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(coordinator.queue_capacity());
        coordinator.register(id, tx).await;
        // Drain welcome and initial snapshot
        assert!(matches!(
            decode(&rx.recv().await.unwrap()),
            ServerMessage::Welcome { .. }
        ));
        assert!(matches!(
            decode(&rx.recv().await.unwrap()),
            ServerMessage::BatchUpdate { .. }
        ));
        (id, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn register_sends_welcome_then_one_snapshot() {
        let store = CountingStore::new(3);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);

        let (tx, mut rx) = mpsc::channel(8);
        coordinator.register(Uuid::new_v4(), tx).await;

        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::Welcome { message } => assert_eq!(message, WELCOME_MESSAGE),
            other => panic!("expected welcome, got {:?}", other),
        }
        assert_eq!(snapshot_len(&rx.recv().await.unwrap()), 3);
        assert!(rx.try_recv().is_err());
        assert_eq!(store.reads(), 1);
        assert_eq!(coordinator.connection_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn register_survives_store_failure() {
        let store = CountingStore::new(1);
        store.fail.store(true, Ordering::SeqCst);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);

        let (tx, mut rx) = mpsc::channel(8);
        coordinator.register(Uuid::new_v4(), tx).await;

        assert!(matches!(
            decode(&rx.recv().await.unwrap()),
            ServerMessage::Welcome { .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.connection_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_mutations_yields_one_broadcast() {
        let store = CountingStore::new(0);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (_id, mut rx) = connect(&coordinator).await;
        let reads_after_register = store.reads();

        for n in 0..10 {
            store.inner.create_batch(row(n)).await.unwrap();
            coordinator.notify_mutation();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(coordinator.is_pending());

        let frame = rx.recv().await.unwrap();
        assert_eq!(snapshot_len(&frame), 10);
        assert_eq!(store.reads(), reads_after_register + 1);
        assert!(!coordinator.is_pending());

        tokio::time::sleep(THROTTLE * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_waits_for_throttle_window() {
        let store = CountingStore::new(1);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (_id, mut rx) = connect(&coordinator).await;

        coordinator.notify_mutation();
        tokio::time::sleep(THROTTLE - Duration::from_millis(1)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(snapshot_len(&rx.recv().await.unwrap()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_after_window_opens_a_new_one() {
        let store = CountingStore::new(0);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (_id, mut rx) = connect(&coordinator).await;

        coordinator.notify_mutation();
        assert_eq!(snapshot_len(&rx.recv().await.unwrap()), 0);

        store.inner.create_batch(row(1)).await.unwrap();
        coordinator.notify_mutation();
        assert_eq!(snapshot_len(&rx.recv().await.unwrap()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_connection_receives_nothing() {
        let store = CountingStore::new(1);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (gone, mut gone_rx) = connect(&coordinator).await;
        let (_kept, mut kept_rx) = connect(&coordinator).await;

        assert!(coordinator.unregister(gone).await);
        assert!(!coordinator.unregister(gone).await);

        coordinator.broadcast_now().await;
        assert!(gone_rx.try_recv().is_err());
        assert_eq!(snapshot_len(&kept_rx.recv().await.unwrap()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_connection_is_dropped_without_affecting_others() {
        let store = CountingStore::new(2);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (_a, mut a_rx) = connect(&coordinator).await;
        let (_b, b_rx) = connect(&coordinator).await;
        let (_c, mut c_rx) = connect(&coordinator).await;

        drop(b_rx);
        coordinator.broadcast_now().await;

        assert_eq!(snapshot_len(&a_rx.recv().await.unwrap()), 2);
        assert_eq!(snapshot_len(&c_rx.recv().await.unwrap()), 2);
        assert_eq!(coordinator.connection_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connection_with_full_queue_is_dropped() {
        let store = CountingStore::new(1);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 2);

        let (tx, _rx) = mpsc::channel(coordinator.queue_capacity());
        coordinator.register(Uuid::new_v4(), tx).await;
        assert_eq!(coordinator.connection_count().await, 1);

        coordinator.broadcast_now().await;
        assert_eq!(coordinator.connection_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_abandons_cycle_and_clears_window() {
        let store = CountingStore::new(1);
        let coordinator = BroadcastCoordinator::new(store.clone(), THROTTLE, 8);
        let (_id, mut rx) = connect(&coordinator).await;

        store.fail.store(true, Ordering::SeqCst);
        coordinator.notify_mutation();
        tokio::time::sleep(THROTTLE * 2).await;
        assert!(rx.try_recv().is_err());
        assert!(!coordinator.is_pending());
        assert_eq!(coordinator.connection_count().await, 1);

        store.fail.store(false, Ordering::SeqCst);
        store.inner.mark_inventoried(1, None).await.unwrap();
        coordinator.notify_mutation();
        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::BatchUpdate { data, .. } => {
                assert_eq!(data[0].status, BatchStatus::Completed)
            }
            other => panic!("expected batch_update, got {:?}", other),
        }
    }
}
