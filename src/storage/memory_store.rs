use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::queue::mutation::PendingMutation;
use crate::storage::error::StorageError;
use crate::storage::PendingStore;

/// Non-durable store, keyed the same way as the sled store. Intended for
/// tests and for hosts that deliberately opt out of persistence.
#[derive(Default)]
pub struct MemoryPendingStore {
    records: Mutex<BTreeMap<String, PendingMutation>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn put(&self, mutation: &PendingMutation) -> Result<(), StorageError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        records.insert(mutation.id.clone(), mutation.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PendingMutation>, StorageError> {
        let records = self.records.lock().expect("store lock poisoned");
        Ok(records.get(id).cloned())
    }

    async fn unsynced(&self) -> Result<Vec<PendingMutation>, StorageError> {
        let records = self.records.lock().expect("store lock poisoned");
        Ok(records.values().filter(|m| !m.synced).cloned().collect())
    }

    async fn mark_synced(&self, id: &str) -> Result<(), StorageError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        let mutation = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        mutation.synced = true;
        Ok(())
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<(), StorageError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        let mutation = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        mutation.attempts = mutation.attempts.saturating_add(1);
        mutation.last_error = Some(error.to_string());
        Ok(())
    }
}
