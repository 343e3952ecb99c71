//! Heartbeat and reconcile loops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;

use super::applier::Applier;
use super::client::ControlPlaneClient;
use super::queue::EventQueue;
use super::state::StateFile;
use crate::api::{ApplyEvent, HeartbeatReport};
use crate::config::AgentConfig;
use crate::lifecycle::Shutdown;
use crate::model::ReleaseStatus;

pub const STATE_FILE: &str = "state.json";
pub const QUEUE_FILE: &str = "events.json";

/// What one reconcile tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    UpToDate,
    Applied(u64),
    Failed(u64),
}

struct Local {
    state: StateFile,
    queue: EventQueue,
}

/// A running node agent.
pub struct Agent {
    config: AgentConfig,
    client: ControlPlaneClient,
    applier: Arc<dyn Applier>,
    local: Mutex<Local>,
    last_heartbeat_error: Mutex<Option<String>>,
}

impl Agent {
    pub fn new(config: AgentConfig, applier: Arc<dyn Applier>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("failed to create state dir {}", config.state_dir.display()))?;
        let state = StateFile::open(&config.state_dir.join(STATE_FILE))?;
        let queue = EventQueue::open(&config.state_dir.join(QUEUE_FILE))?;
        tracing::info!(
            node_id = %config.node_id,
            applied_version = state.state.applied_version,
            queued_events = queue.len(),
            "Agent state loaded"
        );
        Ok(Self {
            client: ControlPlaneClient::new(&config)?,
            config,
            applier,
            local: Mutex::new(Local { state, queue }),
            last_heartbeat_error: Mutex::new(None),
        })
    }

    pub async fn applied_version(&self) -> u64 {
        self.local.lock().await.state.state.applied_version
    }

    pub async fn queued_events(&self) -> usize {
        self.local.lock().await.queue.len()
    }

    /// Send one heartbeat carrying the previous heartbeat's error, if any.
    pub async fn heartbeat_once(&self) -> anyhow::Result<()> {
        let previous_error = self.last_heartbeat_error.lock().await.clone();
        let report = HeartbeatReport {
            protocol_app_version: Some(self.config.protocol_app_version.clone().into()),
            deploy_info: Some(self.config.deploy_info.clone().into()),
            last_heartbeat_error: Some(previous_error.unwrap_or_default().into()),
            ..Default::default()
        };

        match self.client.heartbeat(&report).await {
            Ok(res) => {
                *self.last_heartbeat_error.lock().await = None;
                tracing::debug!(
                    desired_version = res.desired_version,
                    applied_version = res.applied_version,
                    "Heartbeat acknowledged"
                );
                Ok(())
            }
            Err(err) => {
                *self.last_heartbeat_error.lock().await = Some(format!("{err:#}"));
                Err(err)
            }
        }
    }

    /// Reconcile once, then flush queued events.
    pub async fn reconcile_once(&self) -> anyhow::Result<TickOutcome> {
        let outcome = self.reconcile_and_apply().await?;
        if let Err(err) = self.flush_events().await {
            tracing::warn!(error = %format!("{err:#}"), "Event flush failed, will retry");
        }
        Ok(outcome)
    }

    async fn reconcile_and_apply(&self) -> anyhow::Result<TickOutcome> {
        let current = self.applied_version().await;
        let res = self.client.reconcile(current).await?;

        let config = match res.desired_config {
            Some(config) if res.needs_update => config,
            _ => return Ok(TickOutcome::UpToDate),
        };
        let rev = config.rev;
        tracing::info!(from = current, to = rev, summary = %res.desired_config_summary, "Applying desired config");

        let result = self.applier.apply(&config).await;
        let mut local = self.local.lock().await;
        match result {
            Ok(()) => {
                local.state.state.applied_version = rev;
                local.state.state.last_failed_version = None;
                local.state.save()?;
                local.queue.push(ApplyEvent::new(
                    ReleaseStatus::Ok,
                    Some(rev),
                    format!("release applied v{rev}"),
                ))?;
                Ok(TickOutcome::Applied(rev))
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(rev, error = %message, "Apply failed");
                if local.state.state.last_failed_version != Some(rev) {
                    local.state.state.last_failed_version = Some(rev);
                    local.state.save()?;
                    local.queue.push(ApplyEvent::new(ReleaseStatus::Failed, None, message))?;
                }
                Ok(TickOutcome::Failed(rev))
            }
        }
    }

    /// Deliver queued events; they stay queued unless the batch is confirmed.
    pub async fn flush_events(&self) -> anyhow::Result<usize> {
        let batch = {
            let local = self.local.lock().await;
            local.queue.pending().to_vec()
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let res = self.client.send_events(&batch).await?;
        self.local.lock().await.queue.acknowledge(batch.len())?;
        tracing::info!(
            sent = batch.len(),
            accepted = res.accepted,
            rejected = res.rejected,
            applied_version = res.applied_version,
            "Events delivered"
        );
        Ok(batch.len())
    }

    /// Run both loops until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: &Shutdown) {
        if shutdown.is_triggered() {
            return;
        }
        let heartbeat = tokio::spawn(self.clone().heartbeat_loop(shutdown.subscribe()));
        let reconcile = tokio::spawn(self.clone().reconcile_loop(shutdown.subscribe()));
        let (hb, rc) = tokio::join!(heartbeat, reconcile);
        for (name, result) in [("heartbeat", hb), ("reconcile", rc)] {
            if let Err(e) = result {
                tracing::error!(task = name, error = %e, "Agent loop panicked");
            }
        }
        tracing::info!("Agent stopped");
    }

    async fn heartbeat_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.heartbeat_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.heartbeat_once().await {
                        tracing::warn!(error = %format!("{err:#}"), "Heartbeat failed");
                    }
                }
            }
        }
    }

    async fn reconcile_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.reconcile_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    match self.reconcile_once().await {
                        Ok(TickOutcome::UpToDate) => tracing::debug!("Up to date"),
                        Ok(outcome) => tracing::info!(?outcome, "Reconcile tick"),
                        Err(err) => tracing::warn!(error = %format!("{err:#}"), "Reconcile failed"),
                    }
                }
            }
        }
    }
}
