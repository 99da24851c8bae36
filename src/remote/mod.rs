use async_trait::async_trait;
use thiserror::Error;

use crate::queue::mutation::{MutationKind, PendingMutation};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    #[error("Remote rejected mutation: {0}")]
    Rejected(String),
}

/// Remote system of record that pending mutations are eventually applied to.
///
/// Each mutation kind has its own application routine; `apply` dispatches on
/// the record's kind. The queue treats every error as per-record and
/// retryable — implementations that can distinguish permanent rejections
/// should still return them here and let the host inspect `last_error`.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    async fn apply_listing(&self, mutation: &PendingMutation) -> Result<(), RemoteError>;

    async fn apply_transaction(&self, mutation: &PendingMutation) -> Result<(), RemoteError>;

    async fn apply_message(&self, mutation: &PendingMutation) -> Result<(), RemoteError>;

    async fn apply_farm_record(&self, mutation: &PendingMutation) -> Result<(), RemoteError>;

    async fn apply(&self, mutation: &PendingMutation) -> Result<(), RemoteError> {
        match mutation.kind {
            MutationKind::Listing => self.apply_listing(mutation).await,
            MutationKind::Transaction => self.apply_transaction(mutation).await,
            MutationKind::Message => self.apply_message(mutation).await,
            MutationKind::FarmRecord => self.apply_farm_record(mutation).await,
        }
    }
}
