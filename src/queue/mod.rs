pub mod manager;
pub mod mutation;
pub mod status;

pub use manager::SyncQueue;
pub use mutation::{MutationAction, MutationKind, PendingMutation};
pub use status::SyncStatus;
