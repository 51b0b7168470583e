//! Periodic cleanup of idle sessions and dead peers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::registry::Registry;

/// Run [`Registry::sweep_idle`] every `interval` until the task is aborted.
pub fn spawn(registry: Arc<Registry>, interval: Duration, idle_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = registry.sweep_idle(idle_timeout).await;
            if report.is_empty() {
                debug!("sweep found nothing to clean");
            } else {
                info!(
                    expired = report.sessions_expired,
                    dropped = report.sessions_dropped,
                    peers = report.peers_dropped,
                    "sweep cleaned up"
                );
            }
        }
    })
}
