use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since UNIX_EPOCH.
///
/// Falls back to 0 if the system clock is before the epoch, which only
/// happens on a badly misconfigured host.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
