use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::connectivity::{ConnectivityHandle, ConnectivityState};
use crate::queue::SyncQueue;

/// Drives the queue: a fixed-interval tick plus an opportunistic trigger on
/// every offline -> online transition. Both funnel into the same
/// `synchronize`, so overlapping triggers collapse into one pass.
///
/// Owns its tasks; call `shutdown` to stop them and wait. Dropping without
/// shutdown also stops them (the shutdown channel closes) but does not wait.
pub struct SyncScheduler {
    shutdown_tx: watch::Sender<bool>,
    tick_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn spawn(
        queue: Arc<SyncQueue>,
        mut connectivity: ConnectivityHandle,
        period: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tick_task = {
            let queue = Arc::clone(&queue);
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = queue.synchronize().await {
                                log::error!("Scheduled sync pass failed: {e}");
                            }
                        }
                    }
                }
            })
        };

        let event_task = {
            let mut shutdown_rx = shutdown_rx;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        state = connectivity.changed() => match state {
                            Some(ConnectivityState::Connected) => {
                                log::info!("Connectivity restored, triggering sync pass");
                                if let Err(e) = queue.synchronize().await {
                                    log::error!("Reconnect sync pass failed: {e}");
                                }
                            }
                            Some(ConnectivityState::Disconnected) => {}
                            // Monitor dropped; no more transitions will come.
                            None => break,
                        }
                    }
                }
            })
        };

        Self {
            shutdown_tx,
            tick_task,
            event_task,
        }
    }

    /// Stop both tasks and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.tick_task.await;
        let _ = self.event_task.await;
    }
}
