/// Point-in-time view of the queue. Recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Whether the connectivity observer currently reports online.
    pub online: bool,
    /// Whether a sync pass is running right now.
    pub syncing: bool,
    /// Number of records still waiting to sync.
    pub pending: usize,
}
