//! Background eviction of stale authorizations and idle sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use super::correlator::CallbackCorrelator;
use super::session::SessionManager;

/// Run one sweep over both stores.
pub fn sweep_once(correlator: &CallbackCorrelator, sessions: &SessionManager) {
    let stats = correlator.sweep();
    let evicted = sessions.evict_idle();
    if stats.expired > 0 || stats.removed > 0 || evicted > 0 {
        debug!(
            expired = stats.expired,
            removed = stats.removed,
            evicted,
            "Swept authorization state"
        );
    }
}

/// Spawn the periodic sweeper. Abort the handle to stop it.
pub fn spawn_sweeper(
    correlator: Arc<CallbackCorrelator>,
    sessions: Arc<SessionManager>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&correlator, &sessions);
        }
    })
}
