// Core modules
pub mod config;
pub mod connectivity;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod storage;
pub mod common;

// Public exports
pub use config::SyncConfig;
pub use connectivity::{ConnectivityHandle, ConnectivityMonitor, ConnectivityProbe, ConnectivityState};
pub use queue::{MutationAction, MutationKind, PendingMutation, SyncQueue, SyncStatus};
pub use remote::{RemoteError, RemoteTarget};
pub use scheduler::SyncScheduler;
pub use storage::{MemoryPendingStore, PendingStore, SledPendingStore, StorageError};
