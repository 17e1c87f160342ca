//! Session gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  SESSION GATE                     │
//!                     │                                                   │
//!   foo.example.com   │  ┌─────────┐    ┌────────────┐    ┌───────────┐  │
//!   ──────────────────┼─▶│  http   │───▶│   events   │───▶│ event foo │  │
//!                     │  │ server  │    │ pool (tag) │    │  handler  │  │
//!                     │  └─────────┘    └─────┬──────┘    └───────────┘  │
//!                     │                       │ miss                      │
//!                     │                       ▼                           │
//!                     │                     404                           │
//!                     │                                                   │
//!   relay bytes       │  ┌──────────┐   ┌──────────────┐   ┌──────────┐  │
//!   ──────────────────┼─▶│ protocol │──▶│ audit logger │──▶│ team.log │  │
//!   (per participant) │  │  frames  │   │ (worker task)│   └──────────┘  │
//!                     │  └──────────┘   └──────────────┘                  │
//!                     └──────────────────────────────────────────────────┘
//! ```
//!
//! Events are registered on the shared `EventPool` by the lifecycle
//! manager embedding this crate; the binary serves the pool and owns the
//! shutdown order.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use session_gate::config::{load_config, GateConfig};
use session_gate::lifecycle::{assemble, close_registries, signals, Shutdown};
use session_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "session-gate")]
#[command(about = "Subdomain gateway and keystroke auditor for remote-desktop events", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("session-gate v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        base_host = %config.events.base_host,
        log_dir = %config.audit.log_dir,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = assemble(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = tokio::spawn(gateway.server.run(listener, server_shutdown));

    signals::wait_for_signal().await;
    shutdown.trigger();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Gateway server failed"),
        Err(e) => tracing::error!(error = %e, "Gateway server task panicked"),
    }

    close_registries(&gateway.events, &gateway.loggers).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
