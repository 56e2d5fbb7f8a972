//! WebSocket transport: upgrade handling and per-client session loop.

pub mod session;

pub use session::run_ws_session;
