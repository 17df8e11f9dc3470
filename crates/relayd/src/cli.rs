//! Relay daemon command line.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default 0.0.0.0:29999
//! relayd
//!
//! # Custom address
//! relayd --host 127.0.0.1 --port 4000
//!
//! # Settings from a file, overridden by the environment
//! RELAY_PORT=5000 relayd --config /etc/relay.toml
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigOverrides, RelayConfig};
use crate::heartbeat::spawn_heartbeat;
use crate::registry::spawn_registry;
use crate::server::RelayServer;

/// relayd - line-oriented TCP broadcast relay
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
pub struct Args {
    /// Host or address to bind [env: RELAY_HOST] [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on [env: RELAY_PORT] [default: 29999]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// TOML config file [env: RELAY_CONFIG]
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            config_path: args.config,
        }
    }
}

/// Parses arguments, resolves configuration and runs the daemon.
pub fn main() -> Result<()> {
    let args = Args::parse();
    let config = RelayConfig::load(args.into()).context("Failed to load configuration")?;
    run_daemon(config)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: RelayConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_core=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Relay daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry(config.max_clients);
    info!(max_clients = config.max_clients, "Client registry started");

    // Stopped after the server so departures during shutdown are still seen
    let heartbeat_token = CancellationToken::new();
    let (heartbeat_task, _status) =
        spawn_heartbeat(registry.clone(), config.heartbeat, heartbeat_token.clone());

    let server = RelayServer::from_config(&config, registry, cancel_token.clone())
        .await
        .context("Failed to start server")?;

    let mut server_task = tokio::spawn(server.run());

    let server_finished = tokio::select! {
        _ = cancel_token.cancelled() => false,
        _ = &mut server_task => {
            warn!("Server stopped without a shutdown request");
            true
        }
    };

    if !server_finished
        && tokio::time::timeout(config.shutdown_grace, &mut server_task)
            .await
            .is_err()
    {
        warn!(
            grace = ?config.shutdown_grace,
            "Shutdown grace period elapsed, closing remaining connections"
        );
        server_task.abort();
    }

    heartbeat_token.cancel();
    if let Err(e) = heartbeat_task.await {
        warn!(error = %e, "Heartbeat task ended abnormally");
    }

    info!("Relay daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
