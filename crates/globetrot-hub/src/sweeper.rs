//! Periodic eviction of silent participants.

use std::sync::Arc;
use std::time::{Duration, Instant};

use globetrot_core::clock::duration_millis;
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::Hub;
use crate::metrics::{EVICTIONS_TOTAL, SWEEP_DURATION_SECONDS};

/// Run one sweep: evict everyone silent for longer than the heartbeat
/// timeout, then publish the refreshed roster if anyone was evicted and
/// somebody is left to hear it.
///
/// Returns the number of participants evicted.
pub fn sweep_once(hub: &Hub) -> usize {
    let started = Instant::now();
    let now = hub.clock().now_millis();
    let threshold = now.saturating_sub(duration_millis(hub.config().heartbeat_timeout));

    let stale = hub.registry().list_inactive_since(threshold);
    let evicted = stale
        .iter()
        .filter(|name| hub.evict_inactive(name, threshold))
        .count();

    if evicted > 0 {
        counter!(EVICTIONS_TOTAL).increment(evicted as u64);
        if !hub.registry().is_empty() {
            let notified = hub.announce_roster();
            debug!(notified, "roster published after sweep");
        }
        info!(evicted, remaining = hub.registry().len(), "sweep evicted inactive participants");
    }
    histogram!(SWEEP_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    evicted
}

/// Spawn the sweeper loop. It ticks every `interval` and stops when `cancel`
/// fires.
pub fn spawn_sweeper(
    hub: Arc<Hub>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = sweep_once(&hub);
                }
            }
        }
    })
}
