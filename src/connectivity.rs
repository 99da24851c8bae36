use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Connected,
    Disconnected,
}

/// Source of truth for the online/offline signal.
///
/// The host drives transitions through `set_state` (platform online/offline
/// events), or hands the monitor a probe and lets `run_probe` poll. Consumers
/// hold cheap cloneable `ConnectivityHandle`s.
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn set_state(&self, state: ConnectivityState) {
        // send_if_modified keeps subscribers from waking on redundant events.
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                log::info!("Connectivity changed: {:?} -> {:?}", *current, state);
                *current = state;
                true
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow() == ConnectivityState::Connected
    }

    /// Poll the given probe at a fixed interval, feeding results into the
    /// state channel. For hosts without a platform connectivity event.
    /// Never returns on its own; spawn it and abort the task on shutdown.
    pub async fn run_probe<P: ConnectivityProbe>(&self, probe: P, interval: Duration) {
        loop {
            let ok = probe.check_once().await;
            let state = if ok {
                ConnectivityState::Connected
            } else {
                ConnectivityState::Disconnected
            };
            self.set_state(state);
            sleep(interval).await;
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::Disconnected)
    }
}

/// Read-side of the connectivity signal.
#[derive(Clone)]
pub struct ConnectivityHandle {
    rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityHandle {
    pub fn state(&self) -> ConnectivityState {
        *self.rx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state() == ConnectivityState::Connected
    }

    /// Wait for the next state transition. Returns the new state, or None if
    /// the monitor was dropped.
    pub async fn changed(&mut self) -> Option<ConnectivityState> {
        match self.rx.changed().await {
            Ok(()) => Some(*self.rx.borrow_and_update()),
            Err(_) => None,
        }
    }
}

/// Boolean health check against whatever endpoint the host syncs to.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check_once(&self) -> bool;
}
