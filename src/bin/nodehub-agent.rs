//! NodeHub node agent.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use nodehub::agent::{Agent, FileApplier};
use nodehub::config::validation::validate_agent_config;
use nodehub::config::{parse_agent_config, AgentConfig};
use nodehub::lifecycle::{spawn_signal_handler, Shutdown};
use nodehub::observability::logging;

#[derive(Parser)]
#[command(name = "nodehub-agent", version, about = "NodeHub node agent")]
struct Args {
    /// Path to the agent TOML config. Flags override its values.
    #[arg(short, long, env = "NODEHUB_AGENT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    control_plane_url: Option<String>,

    #[arg(long)]
    node_id: Option<String>,

    #[arg(long, env = "NODEHUB_NODE_TOKEN")]
    node_token: Option<String>,

    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Seconds between heartbeats
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Seconds between reconcile polls
    #[arg(long)]
    reconcile_interval: Option<u64>,
}

fn resolve_config(args: Args) -> anyhow::Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => parse_agent_config(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => AgentConfig::default(),
    };
    if let Some(url) = args.control_plane_url {
        config.control_plane_url = url;
    }
    if let Some(id) = args.node_id {
        config.node_id = id;
    }
    if let Some(token) = args.node_token {
        config.node_token = token;
    }
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }
    if let Some(secs) = args.heartbeat_interval {
        config.heartbeat_interval_secs = secs;
    }
    if let Some(secs) = args.reconcile_interval {
        config.reconcile_interval_secs = secs;
    }
    if config.protocol_app_version.is_empty() {
        config.protocol_app_version = env!("CARGO_PKG_VERSION").to_string();
    }

    if let Err(errors) = validate_agent_config(&config) {
        let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        bail!("invalid agent configuration: {}", joined.join(", "));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = resolve_config(Args::parse())?;
    logging::init_logging(&config.observability);

    tracing::info!(
        node_id = %config.node_id,
        control_plane = %config.control_plane_url,
        state_dir = %config.state_dir.display(),
        "nodehub-agent starting"
    );

    let applier = Arc::new(FileApplier::new(&config.state_dir));
    let agent = Arc::new(Agent::new(config, applier)?);

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    agent.run(&shutdown).await;
    Ok(())
}
