//! # multiview
//!
//! Coordinator binary: loads settings, initializes logging and metrics, and
//! serves the HTTP/WebSocket endpoints until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use multiview_core::logging::init_subscriber;
use multiview_server::config::ServerConfig;
use multiview_server::metrics::install_recorder;
use multiview_server::server::CoordinatorServer;
use multiview_settings::MultiviewSettings;

/// How long sockets get to close after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Two-participant session coordinator.
#[derive(Parser, Debug)]
#[command(name = "multiview", about = "Two-participant session coordinator")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.multiview/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter directive (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Server config from settings with CLI overrides applied.
    fn server_config(&self, settings: &MultiviewSettings) -> ServerConfig {
        let mut config = ServerConfig::from(&settings.server);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }

    fn log_level<'a>(&'a self, settings: &'a MultiviewSettings) -> &'a str {
        self.log_level.as_deref().unwrap_or(&settings.logging.level)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(multiview_settings::settings_path);
    let settings = multiview_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    init_subscriber(args.log_level(&settings), settings.logging.format);

    let metrics = install_recorder().context("Failed to install metrics recorder")?;
    let config = args.server_config(&settings);
    let server = CoordinatorServer::new(config, Some(metrics));

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        evict_on_disconnect = server.config().evict_on_disconnect,
        "multiview listening on http://{addr}"
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_TIMEOUT))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
