//! NodeHub control plane server.
//!
//! # Architecture Overview
//!
//! ```text
//!   agents ──▶ /agent/*  ──▶ reconcile::AgentProtocol ─┐
//!   clients ─▶ /sub/*    ──▶ subscription::*          ├──▶ store::DocumentStore
//!   operators ▶ /api/*   ──▶ inventory, templates,    │     (MemoryStore + snapshot)
//!                            releases                 ─┘
//!
//!   config (TOML) ──▶ watcher ──▶ ArcSwap<HubConfig>
//!   SIGINT/SIGTERM ──▶ Shutdown ──▶ graceful drain ──▶ snapshot saved
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use nodehub::config::loader::{apply_env_overrides, load_config};
use nodehub::config::validation::validate_config;
use nodehub::config::watcher::ConfigWatcher;
use nodehub::config::HubConfig;
use nodehub::lifecycle::{spawn_signal_handler, Shutdown};
use nodehub::observability::{logging, metrics};
use nodehub::store::{MemoryStore, SharedStore};
use nodehub::HttpServer;

#[derive(Parser)]
#[command(name = "nodehub", version, about = "NodeHub control plane")]
struct Args {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "NODEHUB_CONFIG")]
    config: Option<PathBuf>,
}

fn load(args: &Args) -> Result<HubConfig, Box<dyn std::error::Error>> {
    match &args.config {
        Some(path) => Ok(load_config(path)?),
        None => {
            let mut config = HubConfig::default();
            apply_env_overrides(&mut config);
            if let Err(errors) = validate_config(&config) {
                let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                return Err(joined.join(", ").into());
            }
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nodehub starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        snapshot = ?config.store.snapshot_path,
        admin_key_configured = !config.admin.api_key.is_empty(),
        "Configuration loaded"
    );
    if config.admin.api_key.is_empty() {
        tracing::warn!("No admin key configured; the admin API will refuse every request");
    }

    let memory = match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_from_file(path)?.with_persist_on_write(config.store.persist_on_write),
        None => MemoryStore::new(None),
    };
    let store: SharedStore = Arc::new(memory.clone());

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher handle alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), rx),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
                    (None, rx)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, store);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    memory.save_to_file()?;
    tracing::info!("Shutdown complete");
    Ok(())
}
