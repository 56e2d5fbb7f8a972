//! Orderly stop of the listener, the sweeper and every client session.

use std::time::Duration;

use globetrot_hub::Hub;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often to check whether sessions have detached while draining.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Stop signal shared by the listener, the sweeper and the `/ws` handler.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the stop token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the stop token. New upgrades are refused from here on.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether the stop token has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the stop token, close every client connection on `hub`, then
    /// wait up to `timeout` for `tasks` to finish and for every session to
    /// detach from the hub.
    ///
    /// Tasks still running at the deadline are aborted. Returns `true` if
    /// everything wound down on its own.
    pub async fn drain(&self, hub: &Hub, tasks: Vec<JoinHandle<()>>, timeout: Duration) -> bool {
        self.shutdown();
        hub.close_all();
        info!(
            tasks = tasks.len(),
            connections = hub.connection_count(),
            timeout_ms = timeout.as_millis() as u64,
            "draining"
        );

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let drained = tokio::time::timeout(timeout, async {
            let _ = futures::future::join_all(tasks).await;
            while hub.connection_count() > 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                lingering_connections = hub.connection_count(),
                "drain timed out after {timeout:?}, aborting remaining tasks"
            );
            for abort in aborts {
                abort.abort();
            }
        }
        drained
    }
}
