use serde::{Deserialize, Serialize};

use crate::common::time::now_millis;

/// Domain entity a mutation targets. Closed set; extend here when the
/// marketplace grows a new syncable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    Listing,
    Transaction,
    Message,
    FarmRecord,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Listing => "listing",
            MutationKind::Transaction => "transaction",
            MutationKind::Message => "message",
            MutationKind::FarmRecord => "farm_record",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

/// One client-originated unit of work not yet confirmed by the remote system.
///
/// `id`, `kind`, `action`, `payload` and `created_at_ms` are fixed at
/// creation; further edits to the same domain entity enqueue a new mutation
/// rather than rewriting the payload in place. `synced` flips false -> true
/// exactly once, on confirmed remote application, and never reverts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: String,
    pub kind: MutationKind,
    pub action: MutationAction,
    pub payload: serde_json::Value,
    pub created_at_ms: u64,
    pub synced: bool,
    /// Number of failed remote applications so far. Observability only;
    /// a record stays eligible for retry regardless of this count.
    pub attempts: u32,
    /// Message from the most recent failed attempt, if any.
    pub last_error: Option<String>,
}

impl PendingMutation {
    pub fn new(kind: MutationKind, action: MutationAction, payload: serde_json::Value) -> Self {
        Self {
            id: generate_mutation_id(),
            kind,
            action,
            payload,
            created_at_ms: now_millis(),
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Zero-padded millisecond timestamp plus a random hex suffix. The padding
/// keeps lexicographic key order equal to creation order in the store.
fn generate_mutation_id() -> String {
    format!("{:015}:{:08x}", now_millis(), rand::random::<u32>())
}
