//! Agent-facing endpoints under `/agent`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{EventsResponse, HeartbeatReport, HeartbeatResponse, ReconcileResponse, NODE_TOKEN_HEADER};
use crate::error::HubError;
use crate::http::response::{ApiResponse, ApiResult};
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentQuery {
    pub node_id: String,
    pub current_version: Option<String>,
}

fn node_token(headers: &HeaderMap) -> &str {
    headers
        .get(NODE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

fn record_failure(endpoint: &'static str, err: HubError) -> HubError {
    metrics::record_agent_request(endpoint, err.code());
    tracing::warn!(endpoint, code = err.code(), error = %err, "Agent request rejected");
    err
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agent/reconcile", get(reconcile))
        .route("/agent/heartbeat", get(heartbeat).post(heartbeat))
        .route("/agent/events", post(events))
}

async fn reconcile(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
    headers: HeaderMap,
) -> ApiResult<ReconcileResponse> {
    state
        .protocol
        .reconcile(&query.node_id, node_token(&headers), query.current_version.as_deref())
        .await
        .map(ApiResponse::ok)
        .map_err(|e| record_failure("reconcile", e))
}

/// Telemetry is optional; an empty or unparsable body counts as no report.
fn parse_report(body: &[u8]) -> Option<HeartbeatReport> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed heartbeat body");
            None
        }
    }
}

async fn heartbeat(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<HeartbeatResponse> {
    let report = parse_report(&body);
    let node_id = match report.as_ref().and_then(|r| r.node_id()) {
        Some(id) if query.node_id.is_empty() => id.to_string(),
        _ => query.node_id,
    };
    state
        .protocol
        .heartbeat(&node_id, node_token(&headers), report.as_ref())
        .await
        .map(ApiResponse::ok)
        .map_err(|e| record_failure("heartbeat", e))
}

async fn events(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<EventsResponse> {
    let body: Value = serde_json::from_slice(&body)
        .map_err(|_| record_failure("events", HubError::validation("invalid JSON body")))?;
    let node_id = body
        .get("node_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(query.node_id);
    state
        .protocol
        .events(&node_id, node_token(&headers), body.get("events"))
        .await
        .map(ApiResponse::ok)
        .map_err(|e| record_failure("events", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        assert!(parse_report(b"").is_none());
        assert!(parse_report(b"  \n").is_none());
        assert!(parse_report(b"{not json").is_none());

        let report = parse_report(br#"{"node_id":"n1","cpu_usage_percent":12.5}"#).unwrap();
        assert_eq!(report.node_id(), Some("n1"));
        assert!(report.cpu_usage_percent.is_some());

        let report = parse_report(br#"{"cpu_usage_percent":12.5,"protocol_app_version":190}"#).unwrap();
        assert_eq!(report.cpu_usage_percent, Some(serde_json::json!(12.5)));
        assert_eq!(report.protocol_app_version, Some(serde_json::json!(190)));
    }

    #[test]
    fn test_node_token_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(node_token(&headers), "");
        headers.insert(NODE_TOKEN_HEADER, " abc ".parse().unwrap());
        assert_eq!(node_token(&headers), "abc");
    }
}
