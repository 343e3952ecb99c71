//! Release (operation) audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::Defaults;

/// Per-node outcome of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseOutcome {
    Queued,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub status: ReleaseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Immutable record of one push to a set of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub version: u64,
    pub mode: String,
    pub node_ids: Vec<String>,
    pub template_ids: Vec<String>,
    pub template_names: Vec<String>,
    pub summary: String,
    pub params: Defaults,
    pub results: Vec<ReleaseResult>,
    pub created_at: DateTime<Utc>,
}

/// Operator input for a release.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewRelease {
    pub node_ids: Vec<String>,
    pub template_ids: Vec<String>,
    pub params: serde_json::Value,
}
