//! # globetrot-server
//!
//! Axum HTTP + `WebSocket` transport for the globetrot hub.
//!
//! - `GET /ws`: allocates a display name, upgrades, and runs a hub session
//! - `GET /health`: liveness and live counters
//! - `GET /metrics`: Prometheus text
//! - Permissive CORS so browser clients on any origin can connect
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{GlobetrotServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
