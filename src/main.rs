//! # globetrot
//!
//! Presence and messaging hub binary. Loads settings, wires the hub into
//! the HTTP/WebSocket server and runs until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use globetrot_core::SystemClock;
use globetrot_hub::{Hub, HubConfig, NamePool};
use globetrot_server::metrics::install_recorder;
use globetrot_server::{GlobetrotServer, ServerConfig};
use globetrot_settings::{GlobetrotSettings, load_settings_from_path, settings_path};

/// Globetrot presence hub.
#[derive(Parser, Debug)]
#[command(name = "globetrot", about = "Real-time presence and messaging hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.globetrot/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(self, settings: &mut GlobetrotSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let path = cli.settings.take().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    globetrot_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    tracing::info!(path = %path.display(), "settings loaded");

    let recorder = install_recorder().context("Failed to install metrics recorder")?;

    let hub_config = HubConfig {
        heartbeat_timeout: settings.presence.heartbeat_timeout(),
        cleanup_interval: settings.presence.cleanup_interval(),
        send_queue_capacity: settings.presence.send_queue_capacity,
    };
    let names = NamePool::new(settings.names.pool.iter().cloned());
    let hub = Arc::new(Hub::new(hub_config, Arc::new(names), Arc::new(SystemClock)));

    let server =
        GlobetrotServer::new(ServerConfig::from(&settings.server), hub).with_metrics(recorder);
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    tracing::info!(%addr, "globetrot ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    if !server.stop(handle, None).await {
        tracing::warn!("some tasks did not finish before the shutdown timeout");
    }
    tracing::info!("stopped");
    Ok(())
}
