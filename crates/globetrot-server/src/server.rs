//! `GlobetrotServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use globetrot_core::HubError;
use globetrot_hub::{Hub, spawn_sweeper};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::HealthReport;
use crate::metrics::WS_UPGRADES_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The presence hub.
    pub hub: Arc<Hub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// Prometheus handle for `/metrics`.
    pub metrics: Option<PrometheusHandle>,
}

/// The globetrot server.
pub struct GlobetrotServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl GlobetrotServer {
    /// Create a new server around `hub`.
    pub fn new(config: ServerConfig, hub: Arc<Hub>) -> Self {
        Self {
            config,
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind, serve, and start the liveness sweeper.
    ///
    /// Returns the bound address (useful with port `0`) and a handle owning
    /// the background tasks.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, ServerHandle)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        let sweeper = spawn_sweeper(
            self.hub.clone(),
            self.hub.config().cleanup_interval,
            self.shutdown.token(),
        );

        info!(%addr, "globetrot server listening");
        Ok((addr, ServerHandle { addr, server, sweeper }))
    }

    /// Close every client connection, stop the listener and the sweeper,
    /// and wait for them up to `timeout` (the configured default if `None`).
    pub async fn stop(&self, handle: ServerHandle, timeout: Option<Duration>) -> bool {
        info!(addr = %handle.addr, "shutting down");
        let timeout = timeout.unwrap_or_else(|| self.config.shutdown_timeout());
        self.shutdown
            .drain(&self.hub, handle.into_join_handles(), timeout)
            .await
    }

    /// The presence hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Handle returned by [`GlobetrotServer::listen`]; owns the background tasks.
#[derive(Debug)]
pub struct ServerHandle {
    /// Bound address.
    pub addr: SocketAddr,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ServerHandle {
    /// Background task handles, for [`ShutdownCoordinator::drain`].
    pub fn into_join_handles(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.sweeper]
    }
}

/// GET /ws
///
/// Allocates a display name before upgrading; an empty pool is refused with
/// 503 and a failed upgrade hands the name back.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let Some(name) = state.hub.names().acquire() else {
        counter!(WS_UPGRADES_REJECTED_TOTAL).increment(1);
        let e = HubError::NamesExhausted;
        warn!(error = %e, "refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
    };

    let failed_hub = state.hub.clone();
    let failed_name = name.clone();
    let hub = state.hub;
    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(error = %e, name = %failed_name, "websocket upgrade failed");
            failed_hub.names().release(&failed_name);
        })
        .on_upgrade(move |socket| run_ws_session(socket, hub, name))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::collect(&state.hub, state.start_time))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
