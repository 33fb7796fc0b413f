//! doorman — request security gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                    DOORMAN                       │
//!                    │                                                  │
//!  Client Request    │  ┌──────────┐  ┌───────────┐  ┌──────────────┐  │
//!  ──────────────────┼─▶│ identity │─▶│rate limit │─▶│ IP admission │  │
//!                    │  └──────────┘  └───────────┘  └──────┬───────┘  │
//!                    │                                      │          │
//!                    │                                      ▼          │
//!                    │  ┌──────────┐  ┌───────────┐  ┌──────────────┐  │
//!  Client Response   │  │ handlers │◀─│ ownership │◀─│  signature   │  │
//!  ◀─────────────────┼──│  (stubs) │  │ /matrix   │  │ verification │  │
//!                    │  └──────────┘  └───────────┘  └──────────────┘  │
//!                    │                                                  │
//!                    │  ┌────────────────────────────────────────────┐ │
//!                    │  │           Cross-Cutting Concerns            │ │
//!                    │  │  config + reload │ observability │ admin   │ │
//!                    │  └────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────┘
//! ```
//!
//! Rejections short-circuit: the first failing stage answers and nothing
//! after it runs.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use doorman::config::watcher::ConfigWatcher;
use doorman::config::{load_config, GatewayConfig};
use doorman::http::GatewayServer;
use doorman::lifecycle::Shutdown;
use doorman::observability;

#[derive(Parser)]
#[command(name = "doorman")]
#[command(about = "Request security gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    observability::logging::init_tracing(&config.observability.log_level);

    tracing::info!("doorman v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.enabled,
        ip_whitelist = config.ip_whitelist.enabled,
        signing = config.signing.enabled,
        admin = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Config watcher feeds reloads; without a file there is nothing to watch.
    let (_watcher_guard, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    let server = GatewayServer::new(config);
    server.run(listener, config_updates, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
