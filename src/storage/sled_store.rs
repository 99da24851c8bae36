use std::path::PathBuf;

use async_trait::async_trait;

use crate::queue::mutation::PendingMutation;
use crate::storage::error::StorageError;
use crate::storage::PendingStore;

/// Sled-backed pending-mutation store, kept in a dedicated tree.
///
/// Keys are the mutation ids; ids embed a zero-padded creation timestamp, so
/// iteration order corresponds to creation order for records written by one
/// process. Values are JSON-encoded records; the opaque payload rules out a
/// non-self-describing encoding.
pub struct SledPendingStore {
    tree: sled::Tree,
    #[allow(dead_code)]
    path: Option<PathBuf>,
}

impl SledPendingStore {
    const TREE_NAME: &'static str = "__pending_mutations__";

    /// Open (or create) a store under the given data directory.
    pub fn open(data_dir: &str) -> Result<Self, StorageError> {
        let path = PathBuf::from(data_dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| StorageError::SledError(e.to_string()))?;

        let db = sled::open(&path).map_err(|e| StorageError::SledError(e.to_string()))?;
        let tree = db
            .open_tree(Self::TREE_NAME)
            .map_err(|e| StorageError::SledError(e.to_string()))?;

        log::info!("Pending-mutation store initialized at {:?}", path);

        Ok(Self {
            tree,
            path: Some(path),
        })
    }

    /// Attach to an existing sled database owned by the host application.
    pub fn new(db: &sled::Db) -> Result<Self, StorageError> {
        let tree = db
            .open_tree(Self::TREE_NAME)
            .map_err(|e| StorageError::SledError(e.to_string()))?;
        Ok(Self { tree, path: None })
    }

    fn encode(mutation: &PendingMutation) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec(mutation).map_err(|e| StorageError::CodecError(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<PendingMutation, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::CodecError(e.to_string()))
    }

    fn get_required(&self, id: &str) -> Result<PendingMutation, StorageError> {
        let bytes = self
            .tree
            .get(id.as_bytes())
            .map_err(|e| StorageError::SledError(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        Self::decode(&bytes)
    }

    fn write(&self, mutation: &PendingMutation) -> Result<(), StorageError> {
        let bytes = Self::encode(mutation)?;
        self.tree
            .insert(mutation.id.as_bytes(), bytes)
            .map_err(|e| StorageError::SledError(e.to_string()))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.tree
            .flush_async()
            .await
            .map_err(|e| StorageError::SledError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PendingStore for SledPendingStore {
    async fn put(&self, mutation: &PendingMutation) -> Result<(), StorageError> {
        self.write(mutation)?;
        self.flush().await
    }

    async fn get(&self, id: &str) -> Result<Option<PendingMutation>, StorageError> {
        match self
            .tree
            .get(id.as_bytes())
            .map_err(|e| StorageError::SledError(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn unsynced(&self) -> Result<Vec<PendingMutation>, StorageError> {
        let mut results = Vec::new();

        for item in self.tree.iter() {
            let (_key, value) = item.map_err(|e| StorageError::SledError(e.to_string()))?;
            let mutation = Self::decode(&value)?;
            if !mutation.synced {
                results.push(mutation);
            }
        }

        Ok(results)
    }

    async fn mark_synced(&self, id: &str) -> Result<(), StorageError> {
        let mut mutation = self.get_required(id)?;
        if mutation.synced {
            // false -> true happens at most once; a repeat mark is a no-op.
            return Ok(());
        }
        mutation.synced = true;
        self.write(&mutation)?;
        self.flush().await
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<(), StorageError> {
        let mut mutation = self.get_required(id)?;
        mutation.attempts = mutation.attempts.saturating_add(1);
        mutation.last_error = Some(error.to_string());
        self.write(&mutation)?;
        self.flush().await
    }
}
