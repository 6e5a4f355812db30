//! sentineld — the sentinel topology daemon.
//!
//! Loads the seed sentinels from a TOML file and supervises one monitor
//! per sentinel in the fleet. Master switches and subscription
//! confirmations are logged as they arrive.
//!
//! # Usage
//!
//! ```text
//! sentineld run --config /etc/sentineld.toml
//! sentineld check-config --config /etc/sentineld.toml
//! ```

mod config;
mod manager;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;

use sentinel_monitor::{ConnectionEvent, MasterSwitchedEvent};
use sentinel_redis::TcpConnector;

use crate::config::DaemonConfig;
use crate::manager::TopologyManager;

#[derive(Parser)]
#[command(name = "sentineld", about = "Sentinel topology daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor the configured sentinels until interrupted.
    Run {
        /// Path to the daemon config file.
        #[arg(long, default_value = "/etc/sentineld.toml")]
        config: PathBuf,
    },
    /// Parse and validate a config file, then exit.
    CheckConfig {
        #[arg(long, default_value = "/etc/sentineld.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,sentineld=debug,sentinel_monitor=debug")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            let config = load(&config)?;
            run(config).await
        }
        Command::CheckConfig { config } => {
            let config = load(&config)?;
            println!("config ok: {} seed sentinel(s)", config.sentinels.len());
            Ok(())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<DaemonConfig> {
    DaemonConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!(sentinels = config.sentinels.len(), "sentineld starting");

    let (switch_tx, switches) = mpsc::channel(config.event_buffer);
    let (connection_tx, connections) = mpsc::channel(config.event_buffer);
    let switch_log = tokio::spawn(log_master_switches(switches));
    let connection_log = tokio::spawn(log_connections(connections));

    let manager = TopologyManager::new(
        Arc::new(TcpConnector),
        config.connect_options(),
        switch_tx,
        connection_tx,
    )
    .with_restart_delay(config.restart_delay());

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let manager_handle = tokio::spawn(manager.run(config.sentinels.clone(), shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let topology = manager_handle.await?;
    info!(
        sentinels = topology.len(),
        clusters = ?topology.clusters(),
        "final topology"
    );

    // The manager owned the last senders; the log tasks drain and exit.
    switch_log.await?;
    connection_log.await?;

    info!("sentineld stopped");
    Ok(())
}

async fn log_master_switches(mut switches: mpsc::Receiver<MasterSwitchedEvent>) {
    while let Some(event) = switches.recv().await {
        info!(
            cluster = %event.name,
            old = %format!("{}:{}", event.old_master_ip, event.old_master_port),
            new = %format!("{}:{}", event.new_master_ip, event.new_master_port),
            "master switched"
        );
    }
}

async fn log_connections(mut connections: mpsc::Receiver<ConnectionEvent>) {
    while let Some(event) = connections.recv().await {
        info!(connected = event.connected, "subscription confirmed, topology resync due");
    }
}
