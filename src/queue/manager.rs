use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::connectivity::ConnectivityHandle;
use crate::queue::mutation::{MutationAction, MutationKind, PendingMutation};
use crate::queue::status::SyncStatus;
use crate::remote::RemoteTarget;
use crate::storage::{PendingStore, StorageError};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Offline queue manager: durably records mutations and reconciles them with
/// the remote target opportunistically.
///
/// Construct one at application start and share it by `Arc`; both the
/// scheduler's timer and any manual "sync now" trigger call the same
/// `synchronize`, which admits at most one pass at a time.
pub struct SyncQueue {
    store: Arc<dyn PendingStore>,
    remote: Arc<dyn RemoteTarget>,
    connectivity: ConnectivityHandle,
    syncing: AtomicBool,
    attempt_timeout: Duration,
}

/// Clears the in-progress flag on every exit path of a sync pass.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncQueue {
    pub fn new(
        store: Arc<dyn PendingStore>,
        remote: Arc<dyn RemoteTarget>,
        connectivity: ConnectivityHandle,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            syncing: AtomicBool::new(false),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Bound on one remote application attempt. A hung transport becomes a
    /// per-record failure instead of holding the in-progress flag forever.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Durably record one mutation. Returns the generated id so the caller
    /// can correlate later. Payload validation is the caller's job.
    pub async fn enqueue(
        &self,
        kind: MutationKind,
        action: MutationAction,
        payload: serde_json::Value,
    ) -> Result<String, StorageError> {
        let mutation = PendingMutation::new(kind, action, payload);
        self.store.put(&mutation).await?;

        log::debug!(
            "Enqueued {} {:?} mutation {}",
            kind.as_str(),
            action,
            mutation.id
        );

        Ok(mutation.id)
    }

    /// All records not yet confirmed by the remote target. Order is
    /// unspecified; sort by `created_at_ms` if creation order matters.
    pub async fn pending(&self) -> Result<Vec<PendingMutation>, StorageError> {
        self.store.unsynced().await
    }

    pub async fn status(&self) -> Result<SyncStatus, StorageError> {
        let pending = self.store.unsynced().await?.len();
        Ok(SyncStatus {
            online: self.connectivity.is_online(),
            syncing: self.syncing.load(Ordering::Acquire),
            pending,
        })
    }

    /// Run one sync pass over the current pending snapshot.
    ///
    /// No-op while offline or while another pass is in flight. Per-record
    /// failures are logged and left pending for the next pass; only a failure
    /// to read the pending set aborts the pass.
    pub async fn synchronize(&self) -> Result<(), StorageError> {
        if !self.connectivity.is_online() {
            log::debug!("Skipping sync pass: offline");
            return Ok(());
        }

        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Skipping sync pass: another pass is in progress");
            return Ok(());
        }
        let _guard = PassGuard(&self.syncing);

        let pending = self.store.unsynced().await?;
        if pending.is_empty() {
            return Ok(());
        }

        let total = pending.len();
        let mut applied = 0usize;

        for mutation in &pending {
            match timeout(self.attempt_timeout, self.remote.apply(mutation)).await {
                Ok(Ok(())) => match self.store.mark_synced(&mutation.id).await {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        // Applied remotely but not recorded locally; the
                        // record stays pending and gets retried next pass.
                        log::warn!(
                            "Failed to mark mutation {} synced: {e}. Retrying next pass",
                            mutation.id
                        );
                    }
                },
                Ok(Err(e)) => {
                    log::warn!(
                        "Remote application failed for {} mutation {}: {e}",
                        mutation.kind.as_str(),
                        mutation.id
                    );
                    self.note_failure(&mutation.id, &e.to_string()).await;
                }
                Err(_) => {
                    log::warn!(
                        "Remote application timed out for mutation {} after {:?}",
                        mutation.id,
                        self.attempt_timeout
                    );
                    self.note_failure(&mutation.id, "attempt timed out").await;
                }
            }
        }

        log::info!("Sync pass applied {}/{} pending mutations", applied, total);

        Ok(())
    }

    async fn note_failure(&self, id: &str, error: &str) {
        // Best effort: the attempt counter is observability, not correctness.
        if let Err(e) = self.store.record_failure(id, error).await {
            log::warn!("Failed to record attempt for mutation {id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
    use crate::remote::RemoteError;
    use crate::storage::MemoryPendingStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Remote target that records applied ids and fails those it is told to.
    #[derive(Default)]
    struct ScriptedRemote {
        fail_ids: Mutex<Vec<String>>,
        applied: Mutex<Vec<String>>,
    }

    impl ScriptedRemote {
        fn fail(&self, id: &str) {
            self.fail_ids.lock().unwrap().push(id.to_string());
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }

        fn handle(&self, m: &PendingMutation) -> Result<(), RemoteError> {
            if self.fail_ids.lock().unwrap().contains(&m.id) {
                return Err(RemoteError::Unavailable("scripted failure".into()));
            }
            self.applied.lock().unwrap().push(m.id.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteTarget for ScriptedRemote {
        async fn apply_listing(&self, m: &PendingMutation) -> Result<(), RemoteError> {
            self.handle(m)
        }

        async fn apply_transaction(&self, m: &PendingMutation) -> Result<(), RemoteError> {
            self.handle(m)
        }

        async fn apply_message(&self, m: &PendingMutation) -> Result<(), RemoteError> {
            self.handle(m)
        }

        async fn apply_farm_record(&self, m: &PendingMutation) -> Result<(), RemoteError> {
            self.handle(m)
        }
    }

    /// Store wrapper that fails selected operations, for exercising the
    /// storage-failure branches of a sync pass.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryPendingStore,
        fail_unsynced: AtomicBool,
        fail_mark_ids: Mutex<Vec<String>>,
    }

    impl FailingStore {
        fn fail_next_unsynced(&self) {
            self.fail_unsynced.store(true, Ordering::SeqCst);
        }

        fn fail_mark(&self, id: &str) {
            self.fail_mark_ids.lock().unwrap().push(id.to_string());
        }
    }

    #[async_trait]
    impl PendingStore for FailingStore {
        async fn put(&self, mutation: &PendingMutation) -> Result<(), StorageError> {
            self.inner.put(mutation).await
        }

        async fn get(&self, id: &str) -> Result<Option<PendingMutation>, StorageError> {
            self.inner.get(id).await
        }

        async fn unsynced(&self) -> Result<Vec<PendingMutation>, StorageError> {
            if self.fail_unsynced.swap(false, Ordering::SeqCst) {
                return Err(StorageError::SledError("injected read failure".into()));
            }
            self.inner.unsynced().await
        }

        async fn mark_synced(&self, id: &str) -> Result<(), StorageError> {
            if self.fail_mark_ids.lock().unwrap().iter().any(|f| f == id) {
                return Err(StorageError::SledError("injected write failure".into()));
            }
            self.inner.mark_synced(id).await
        }

        async fn record_failure(&self, id: &str, error: &str) -> Result<(), StorageError> {
            self.inner.record_failure(id, error).await
        }
    }

    fn queue_with(
        remote: Arc<ScriptedRemote>,
        initial: ConnectivityState,
    ) -> (SyncQueue, ConnectivityMonitor) {
        let monitor = ConnectivityMonitor::new(initial);
        let queue = SyncQueue::new(
            Arc::new(MemoryPendingStore::new()),
            remote,
            monitor.handle(),
        );
        (queue, monitor)
    }

    #[tokio::test]
    async fn enqueue_is_visible_in_pending_before_any_sync() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, _monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Disconnected);

        let id = queue
            .enqueue(
                MutationKind::Listing,
                MutationAction::Create,
                serde_json::json!({"crop": "maize", "qty": 50}),
            )
            .await
            .unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert!(!pending[0].synced);
        assert_eq!(pending[0].payload["crop"], "maize");
    }

    #[tokio::test]
    async fn synchronize_is_noop_while_offline() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, _monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Disconnected);

        queue
            .enqueue(
                MutationKind::Message,
                MutationAction::Create,
                serde_json::json!({"body": "hello"}),
            )
            .await
            .unwrap();

        queue.synchronize().await.unwrap();

        assert!(remote.applied().is_empty(), "offline pass must not hit remote");
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn synchronize_applies_and_marks_each_record() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, _monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Connected);

        let id = queue
            .enqueue(
                MutationKind::Transaction,
                MutationAction::Create,
                serde_json::json!({"amount": 1200}),
            )
            .await
            .unwrap();

        queue.synchronize().await.unwrap();

        assert_eq!(remote.applied(), vec![id]);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failing_record_does_not_block_the_others() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, _monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Connected);

        let mut ids = Vec::new();
        for qty in [1, 2, 3] {
            ids.push(
                queue
                    .enqueue(
                        MutationKind::Listing,
                        MutationAction::Create,
                        serde_json::json!({"qty": qty}),
                    )
                    .await
                    .unwrap(),
            );
        }
        remote.fail(&ids[1]);

        queue.synchronize().await.unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[1]);
        assert!(!pending[0].synced);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("Remote unavailable: scripted failure"));

        let mut applied = remote.applied();
        applied.sort();
        let mut expected = vec![ids[0].clone(), ids[2].clone()];
        expected.sort();
        assert_eq!(applied, expected);
    }

    #[tokio::test]
    async fn failed_record_is_retried_on_the_next_pass() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, _monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Connected);

        let id = queue
            .enqueue(
                MutationKind::FarmRecord,
                MutationAction::Update,
                serde_json::json!({"note": "irrigated"}),
            )
            .await
            .unwrap();
        remote.fail(&id);

        queue.synchronize().await.unwrap();
        assert_eq!(queue.pending().await.unwrap().len(), 1);

        remote.fail_ids.lock().unwrap().clear();
        queue.synchronize().await.unwrap();

        assert!(queue.pending().await.unwrap().is_empty());
        assert_eq!(remote.applied(), vec![id]);
    }

    #[tokio::test]
    async fn status_reports_connectivity_and_pending_count() {
        let remote = Arc::new(ScriptedRemote::default());
        let (queue, monitor) = queue_with(Arc::clone(&remote), ConnectivityState::Disconnected);

        queue
            .enqueue(
                MutationKind::Message,
                MutationAction::Create,
                serde_json::json!({"body": "price?"}),
            )
            .await
            .unwrap();

        let status = queue.status().await.unwrap();
        assert!(!status.online);
        assert!(!status.syncing);
        assert_eq!(status.pending, 1);

        monitor.set_state(ConnectivityState::Connected);
        queue.synchronize().await.unwrap();

        let status = queue.status().await.unwrap();
        assert!(status.online);
        assert!(!status.syncing);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn attempt_timeout_leaves_record_pending() {
        struct StuckRemote;

        #[async_trait]
        impl RemoteTarget for StuckRemote {
            async fn apply_listing(&self, _m: &PendingMutation) -> Result<(), RemoteError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }

            async fn apply_transaction(&self, _m: &PendingMutation) -> Result<(), RemoteError> {
                unreachable!()
            }

            async fn apply_message(&self, _m: &PendingMutation) -> Result<(), RemoteError> {
                unreachable!()
            }

            async fn apply_farm_record(&self, _m: &PendingMutation) -> Result<(), RemoteError> {
                unreachable!()
            }
        }

        let monitor = ConnectivityMonitor::new(ConnectivityState::Connected);
        let queue = SyncQueue::new(
            Arc::new(MemoryPendingStore::new()),
            Arc::new(StuckRemote),
            monitor.handle(),
        )
        .with_attempt_timeout(Duration::from_millis(20));

        queue
            .enqueue(
                MutationKind::Listing,
                MutationAction::Create,
                serde_json::json!({"qty": 1}),
            )
            .await
            .unwrap();

        queue.synchronize().await.unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("attempt timed out"));

        // The in-progress flag must be clear again.
        assert!(!queue.status().await.unwrap().syncing);
    }

    #[tokio::test]
    async fn unreadable_pending_set_aborts_the_pass() {
        let store = Arc::new(FailingStore::default());
        let remote = Arc::new(ScriptedRemote::default());
        let monitor = ConnectivityMonitor::new(ConnectivityState::Connected);
        let queue = SyncQueue::new(
            Arc::clone(&store) as Arc<dyn PendingStore>,
            Arc::clone(&remote) as Arc<dyn RemoteTarget>,
            monitor.handle(),
        );

        queue
            .enqueue(
                MutationKind::Listing,
                MutationAction::Create,
                serde_json::json!({"qty": 4}),
            )
            .await
            .unwrap();

        store.fail_next_unsynced();
        let err = queue.synchronize().await.unwrap_err();
        assert!(matches!(err, StorageError::SledError(_)));
        assert!(remote.applied().is_empty(), "nothing to process, nothing sent");

        // The aborted pass released the in-progress flag; the next one drains.
        assert!(!queue.status().await.unwrap().syncing);
        queue.synchronize().await.unwrap();
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_synced_failure_is_scoped_to_one_record() {
        let store = Arc::new(FailingStore::default());
        let remote = Arc::new(ScriptedRemote::default());
        let monitor = ConnectivityMonitor::new(ConnectivityState::Connected);
        let queue = SyncQueue::new(
            Arc::clone(&store) as Arc<dyn PendingStore>,
            Arc::clone(&remote) as Arc<dyn RemoteTarget>,
            monitor.handle(),
        );

        let first = queue
            .enqueue(
                MutationKind::Message,
                MutationAction::Create,
                serde_json::json!({"body": "offer"}),
            )
            .await
            .unwrap();
        let second = queue
            .enqueue(
                MutationKind::Message,
                MutationAction::Create,
                serde_json::json!({"body": "counter-offer"}),
            )
            .await
            .unwrap();
        store.fail_mark(&first);

        queue.synchronize().await.unwrap();

        // Both records reached the remote; only the unmarkable one is left
        // pending, to be retried next pass.
        let mut applied = remote.applied();
        applied.sort();
        let mut expected = vec![first.clone(), second.clone()];
        expected.sort();
        assert_eq!(applied, expected);

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first);
        assert!(!pending[0].synced);
        assert!(store.get(&second).await.unwrap().unwrap().synced);
    }
}
