pub mod error;
pub mod memory_store;
pub mod sled_store;

use async_trait::async_trait;

use crate::queue::mutation::PendingMutation;

pub use self::error::StorageError;
pub use self::memory_store::MemoryPendingStore;
pub use self::sled_store::SledPendingStore;

/// Persistent store boundary for pending mutations.
///
/// Implementations provide single-record atomicity only; the queue never
/// needs multi-record transactions because per-record sync outcomes are
/// independent.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Append or overwrite one record. Callers may assume durability once
    /// this returns Ok for a durable implementation.
    async fn put(&self, mutation: &PendingMutation) -> Result<(), StorageError>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<Option<PendingMutation>, StorageError>;

    /// All records with `synced = false`. Order is unspecified; callers that
    /// need determinism sort by `created_at_ms`.
    async fn unsynced(&self) -> Result<Vec<PendingMutation>, StorageError>;

    /// Targeted single-record update flipping `synced` to true.
    async fn mark_synced(&self, id: &str) -> Result<(), StorageError>;

    /// Bump the attempt counter and store the latest error message.
    async fn record_failure(&self, id: &str, error: &str) -> Result<(), StorageError>;
}
