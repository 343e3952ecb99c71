//! Node documents.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::template::Defaults;

/// Window inside which a node counts as online after its last contact.
pub const ONLINE_WINDOW_SECS: i64 = 120;

/// Node deployment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Vps,
    Edge,
}

impl NodeType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vps" => Some(NodeType::Vps),
            "edge" => Some(NodeType::Edge),
            _ => None,
        }
    }
}

/// Outcome of the most recent release as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Idle,
    Pending,
    Ok,
    Failed,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Idle => "idle",
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Ok => "ok",
            ReleaseStatus::Failed => "failed",
        }
    }
}

/// Snapshot of one template inside a desired config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSnapshot {
    pub id: String,
    pub name: String,
    pub protocol: String,
    pub transport: String,
    pub tls_mode: String,
    pub defaults: Defaults,
}

/// The configuration a node should converge to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredConfig {
    pub rev: u64,
    pub template_ids: Vec<String>,
    pub template_names: Vec<String>,
    pub templates: Vec<TemplateSnapshot>,
    pub params: Defaults,
    pub operation_id: String,
    pub created_at: DateTime<Utc>,
}

/// A relay node and its reconciliation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub region: String,
    pub tags: Vec<String>,
    pub entry_cdn: String,
    pub entry_direct: String,
    pub entry_ip: String,
    pub token: String,

    pub desired_version: u64,
    pub applied_version: u64,
    pub desired_config: Option<DesiredConfig>,
    pub desired_config_summary: String,
    pub applied_config_summary: String,
    pub last_release_status: ReleaseStatus,
    pub last_release_message: String,

    pub last_seen_at: Option<DateTime<Utc>>,
    pub heartbeat_reported_at: Option<DateTime<Utc>>,
    pub protocol_app_version: String,
    pub deploy_info: String,
    pub last_heartbeat_error: String,
    pub cpu_usage_percent: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub memory_total_mb: Option<f64>,
    pub memory_usage_percent: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Copy the desired summary into the applied one once the node caught up.
    ///
    /// Never touches the applied summary while `applied_version` is behind.
    pub fn sync_applied_summary(&mut self) {
        if self.applied_version >= self.desired_version && !self.desired_config_summary.is_empty() {
            self.applied_config_summary = self.desired_config_summary.clone();
        }
    }

    /// True when the last contact is within the online window.
    pub fn is_online(&self, now: DateTime<Utc>) -> bool {
        match self.last_seen_at {
            Some(seen) => now - seen <= Duration::seconds(ONLINE_WINDOW_SECS),
            None => false,
        }
    }

    /// Address clients should dial: direct entry, then CDN entry, then raw IP.
    pub fn entry_address(&self) -> Option<&str> {
        [&self.entry_direct, &self.entry_cdn, &self.entry_ip]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}
