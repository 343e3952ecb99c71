//! The heartbeat / reconcile / events exchange.
//!
//! Every call authenticates the node by exact token match, reads the node
//! document once and writes it back at most once.

use chrono::Utc;
use serde_json::Value;

use super::events::apply_batch;
use super::telemetry::{apply_report, as_finite};
use crate::api::{EventsResponse, HeartbeatReport, HeartbeatResponse, ReconcileResponse};
use crate::error::{HubError, HubResult};
use crate::model::Node;
use crate::observability::metrics;
use crate::store::{get_json, keys, put_json, SharedStore};

/// Parse the reported version: non-finite or unparsable reads as 0,
/// fractions are floored, negatives clamp to 0.
pub fn parse_current_version(raw: Option<&str>) -> u64 {
    raw.and_then(|s| as_finite(&Value::from(s)))
        .map(|n| n.floor().max(0.0) as u64)
        .unwrap_or(0)
}

/// Agent-facing protocol service.
#[derive(Clone)]
pub struct AgentProtocol {
    store: SharedStore,
}

impl AgentProtocol {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Load the node and check its token.
    ///
    /// Input checks come first so a missing id is a validation error even
    /// without a token.
    pub async fn authenticate(&self, node_id: &str, token: &str) -> HubResult<Node> {
        if node_id.is_empty() {
            return Err(HubError::validation("node_id is required"));
        }
        if token.is_empty() {
            return Err(HubError::unauthorized("X-Node-Token is required"));
        }
        let node: Node = get_json(self.store.as_ref(), &keys::node(node_id))
            .await?
            .ok_or_else(|| HubError::not_found("Node not found"))?;
        if node.token != token {
            tracing::warn!(node_id = %node_id, "Rejected agent call with invalid token");
            return Err(HubError::unauthorized("Invalid node token"));
        }
        Ok(node)
    }

    async fn save(&self, node: &Node) -> HubResult<()> {
        put_json(self.store.as_ref(), &keys::node(&node.id), node).await?;
        Ok(())
    }

    /// Record the agent's reported version and tell it whether to update.
    ///
    /// The reported version overwrites `applied_version`, even downward.
    pub async fn reconcile(
        &self,
        node_id: &str,
        token: &str,
        current_version: Option<&str>,
    ) -> HubResult<ReconcileResponse> {
        let reported = parse_current_version(current_version);
        let mut node = self.authenticate(node_id, token).await?;

        if reported != node.applied_version {
            tracing::debug!(
                node_id = %node.id,
                from = node.applied_version,
                to = reported,
                "Agent reported applied version"
            );
            node.applied_version = reported;
            node.sync_applied_summary();
            node.updated_at = Utc::now();
            self.save(&node).await?;
        }
        metrics::record_agent_request("reconcile", "ok");

        Ok(ReconcileResponse {
            node_id: node.id.clone(),
            current_version: node.applied_version,
            desired_version: node.desired_version,
            needs_update: node.desired_version > node.applied_version,
            desired_config_summary: node.desired_config_summary.clone(),
            desired_config: node.desired_config,
        })
    }

    /// Mark the node as seen and store its telemetry, if any.
    pub async fn heartbeat(
        &self,
        node_id: &str,
        token: &str,
        report: Option<&HeartbeatReport>,
    ) -> HubResult<HeartbeatResponse> {
        let mut node = self.authenticate(node_id, token).await?;

        let now = Utc::now();
        node.last_seen_at = Some(now);
        node.updated_at = now;
        if let Some(report) = report {
            apply_report(&mut node, report, now);
        }
        self.save(&node).await?;
        metrics::record_agent_request("heartbeat", "ok");

        Ok(HeartbeatResponse {
            node_id: node.id,
            desired_version: node.desired_version,
            applied_version: node.applied_version,
            last_seen_at: node.last_seen_at,
            heartbeat_reported_at: node.heartbeat_reported_at,
        })
    }

    /// Ingest a batch of apply-result events.
    ///
    /// `events` is the raw `events` member of the request body.
    pub async fn events(&self, node_id: &str, token: &str, events: Option<&Value>) -> HubResult<EventsResponse> {
        if node_id.is_empty() {
            return Err(HubError::validation("node_id is required"));
        }
        if token.is_empty() {
            return Err(HubError::unauthorized("X-Node-Token is required"));
        }
        let raw_events = match events {
            Some(Value::Array(items)) if !items.is_empty() => items.as_slice(),
            _ => return Err(HubError::validation("events must be a non-empty array")),
        };

        let mut node = self.authenticate(node_id, token).await?;
        let outcome = apply_batch(&mut node, raw_events);

        if outcome.accepted > 0 {
            node.updated_at = Utc::now();
            self.save(&node).await?;
        }
        metrics::record_agent_request("events", "ok");
        metrics::record_events(outcome.accepted, outcome.rejected);
        tracing::info!(
            node_id = %node.id,
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            applied_version = node.applied_version,
            status = node.last_release_status.as_str(),
            "Processed agent events"
        );

        Ok(EventsResponse {
            node_id: node.id,
            accepted: outcome.accepted,
            rejected: outcome.rejected,
            applied_version: node.applied_version,
            applied_config_summary: node.applied_config_summary,
            last_release_status: node.last_release_status,
            last_release_message: node.last_release_message,
        })
    }
}
