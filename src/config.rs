use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory for the sled-backed pending store.
    pub data_dir: String,
    /// Seconds between scheduled sync passes.
    pub sync_interval_secs: u64,
    /// Upper bound in seconds on one remote application attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            sync_interval_secs: 30,
            attempt_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_interval_secs)
    }

    pub fn attempt_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.attempt_timeout_secs)
    }
}
