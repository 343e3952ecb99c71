//! Wire types of the agent protocol, shared by the control plane and the
//! agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{DesiredConfig, ReleaseStatus};

pub const NODE_TOKEN_HEADER: &str = "x-node-token";
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Response of `GET /agent/reconcile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub node_id: String,
    pub current_version: u64,
    pub desired_version: u64,
    pub desired_config: Option<DesiredConfig>,
    pub desired_config_summary: String,
    pub needs_update: bool,
}

/// Optional telemetry body of a heartbeat.
///
/// Every field stays raw JSON so that one garbage value is nulled on its
/// own instead of failing the whole report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_percent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_total_mb: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_percent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_app_version: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_error: Option<Value>,
}

impl HeartbeatReport {
    /// The reporting node's id, when sent as a non-empty string.
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_ref()?.as_str().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Response of `GET|POST /agent/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub node_id: String,
    pub desired_version: u64,
    pub applied_version: u64,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub heartbeat_reported_at: Option<DateTime<Utc>>,
}

/// One apply-result event as sent by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ReleaseStatus,
    pub applied_version: Option<u64>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ApplyEvent {
    pub const KIND: &'static str = "apply_result";

    pub fn new(status: ReleaseStatus, applied_version: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            kind: Self::KIND.to_string(),
            status,
            applied_version,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Body of `POST /agent/events` as sent by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsRequest {
    pub node_id: String,
    pub events: Vec<ApplyEvent>,
}

/// Response of `POST /agent/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    pub node_id: String,
    pub accepted: usize,
    pub rejected: usize,
    pub applied_version: u64,
    pub applied_config_summary: String,
    pub last_release_status: ReleaseStatus,
    pub last_release_message: String,
}

/// Error body inside the failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub at: DateTime<Utc>,
    pub request_id: String,
}

/// `{success, data | error, meta}` as returned by every JSON endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_event_wire_shape() {
        let event = ApplyEvent::new(ReleaseStatus::Ok, Some(3), "applied");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("apply_result"));
        assert_eq!(value["status"], json!("ok"));
        assert_eq!(value["applied_version"], json!(3));
    }

    #[test]
    fn test_heartbeat_report_tolerates_mistyped_fields() {
        let report: HeartbeatReport = serde_json::from_value(json!({
            "node_id": 7,
            "cpu_usage_percent": 12.5,
            "protocol_app_version": 190,
            "deploy_info": ["docker"],
        }))
        .unwrap();
        assert_eq!(report.node_id(), None);
        assert_eq!(report.cpu_usage_percent, Some(json!(12.5)));
        assert_eq!(report.protocol_app_version, Some(json!(190)));
    }

    #[test]
    fn test_error_envelope_parses() {
        let env: Envelope<ReconcileResponse> = serde_json::from_value(json!({
            "success": false,
            "error": {"code": "UNAUTHORIZED", "message": "Invalid node token"},
            "meta": {"at": "2026-01-01T00:00:00Z", "request_id": "r"}
        }))
        .unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.error.unwrap().code, "UNAUTHORIZED");
    }
}
