//! Apply-result event normalization and application.
//!
//! Events arrive as raw JSON so that one malformed entry is counted as
//! rejected instead of failing the whole batch.

use serde_json::Value;

use super::telemetry::{as_finite, clip_text};
use crate::api::ApplyEvent;
use crate::model::{Node, ReleaseStatus};

/// A validated apply-result event.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub status: ReleaseStatus,
    pub applied_version: Option<u64>,
    pub message: String,
}

fn string_field(raw: &serde_json::Map<String, Value>, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Validate one raw event. `None` means rejected.
///
/// `applied_version`: absent or null means "no version"; a blank string is
/// version 0; a finite number or numeric string is floored and clamped at
/// zero; anything else rejects.
pub fn normalize_event(raw: &Value) -> Option<NormalizedEvent> {
    let obj = raw.as_object()?;

    if string_field(obj, "type") != ApplyEvent::KIND {
        return None;
    }

    let status = match string_field(obj, "status").as_str() {
        "pending" => ReleaseStatus::Pending,
        "ok" => ReleaseStatus::Ok,
        "failed" => ReleaseStatus::Failed,
        _ => return None,
    };

    let applied_version = match obj.get("applied_version") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => Some(0),
        Some(v) => Some(as_finite(v)?.floor().max(0.0) as u64),
    };

    Some(NormalizedEvent {
        event_id: string_field(obj, "event_id"),
        status,
        applied_version,
        message: clip_text(&string_field(obj, "message")),
    })
}

/// Fold one event into the node.
///
/// The version is max-merged so duplicates and reordering are harmless. A
/// failed event never moves the version.
pub fn apply_event(node: &mut Node, event: &NormalizedEvent) {
    if event.status != ReleaseStatus::Failed {
        if let Some(version) = event.applied_version {
            node.applied_version = node.applied_version.max(version);
        }
    }
    node.sync_applied_summary();

    node.last_release_status = event.status;
    node.last_release_message = if !event.message.is_empty() {
        event.message.clone()
    } else {
        match event.status {
            ReleaseStatus::Ok => format!("release applied v{}", node.applied_version),
            ReleaseStatus::Failed => "release apply failed".to_string(),
            _ => "release apply pending".to_string(),
        }
    };
}

/// Counts of one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// Normalize and apply every event in order.
pub fn apply_batch(node: &mut Node, raw_events: &[Value]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for raw in raw_events {
        match normalize_event(raw) {
            Some(event) => {
                apply_event(node, &event);
                outcome.accepted += 1;
            }
            None => {
                tracing::debug!(node_id = %node.id, event = %raw, "Rejected malformed event");
                outcome.rejected += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending_node() -> Node {
        Node {
            id: "node_1".into(),
            desired_version: 2,
            applied_version: 1,
            desired_config_summary: "v2: Trojan + TCP + TLS".into(),
            applied_config_summary: "v1: Hysteria2".into(),
            last_release_status: ReleaseStatus::Pending,
            ..Default::default()
        }
    }

    fn event(status: &str, version: Value) -> Value {
        json!({
            "event_id": "e1",
            "type": "apply_result",
            "status": status,
            "applied_version": version,
            "message": "",
            "occurred_at": "2026-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        assert!(normalize_event(&json!("string")).is_none());
        assert!(normalize_event(&json!([1, 2])).is_none());
        assert!(normalize_event(&json!({"type": "other", "status": "ok"})).is_none());
        assert!(normalize_event(&json!({"type": "apply_result", "status": "done"})).is_none());
        assert!(normalize_event(&event("ok", json!("abc"))).is_none());
        assert!(normalize_event(&event("ok", json!({}))).is_none());
    }

    #[test]
    fn test_normalize_version_forms() {
        assert_eq!(normalize_event(&event("ok", json!(2.9))).unwrap().applied_version, Some(2));
        assert_eq!(normalize_event(&event("ok", json!("3"))).unwrap().applied_version, Some(3));
        assert_eq!(normalize_event(&event("ok", json!(-4))).unwrap().applied_version, Some(0));
        assert_eq!(normalize_event(&event("ok", json!(""))).unwrap().applied_version, Some(0));
        assert_eq!(normalize_event(&event("ok", json!("  "))).unwrap().applied_version, Some(0));
        assert_eq!(normalize_event(&event("ok", Value::Null)).unwrap().applied_version, None);
        let missing = json!({"type": "apply_result", "status": "pending"});
        assert_eq!(normalize_event(&missing).unwrap().applied_version, None);
    }

    #[test]
    fn test_ok_event_converges_and_copies_summary() {
        let mut node = pending_node();
        let outcome = apply_batch(&mut node, &[event("ok", json!(2))]);

        assert_eq!(outcome, BatchOutcome { accepted: 1, rejected: 0 });
        assert_eq!(node.applied_version, 2);
        assert_eq!(node.last_release_status, ReleaseStatus::Ok);
        assert_eq!(node.last_release_message, "release applied v2");
        assert_eq!(node.applied_config_summary, "v2: Trojan + TCP + TLS");
    }

    #[test]
    fn test_events_never_lower_the_version() {
        let mut node = pending_node();
        node.applied_version = 5;
        apply_batch(&mut node, &[event("ok", json!(3)), event("pending", json!(1))]);
        assert_eq!(node.applied_version, 5);
        assert_eq!(node.last_release_status, ReleaseStatus::Pending);
        assert_eq!(node.last_release_message, "release apply pending");
    }

    #[test]
    fn test_failed_event_keeps_version_and_summary() {
        let mut node = pending_node();
        let mut failed = event("failed", json!(2));
        failed["message"] = json!("  xray exited with code 1  ");
        apply_batch(&mut node, &[failed]);

        assert_eq!(node.applied_version, 1);
        assert_eq!(node.applied_config_summary, "v1: Hysteria2");
        assert_eq!(node.last_release_status, ReleaseStatus::Failed);
        assert_eq!(node.last_release_message, "xray exited with code 1");
    }

    #[test]
    fn test_ok_without_version_behind_keeps_summary() {
        let mut node = pending_node();
        apply_batch(&mut node, &[event("ok", Value::Null)]);
        assert_eq!(node.last_release_status, ReleaseStatus::Ok);
        assert_eq!(node.applied_config_summary, "v1: Hysteria2");
        assert_eq!(node.last_release_message, "release applied v1");
    }

    #[test]
    fn test_duplicate_events_are_idempotent() {
        let mut once = pending_node();
        apply_batch(&mut once, &[event("ok", json!(2))]);
        let mut twice = pending_node();
        apply_batch(&mut twice, &[event("ok", json!(2)), event("ok", json!(2))]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mixed_batch_counts() {
        let mut node = pending_node();
        let outcome = apply_batch(
            &mut node,
            &[json!(null), event("ok", json!(2)), json!({"type": "apply_result"})],
        );
        assert_eq!(outcome, BatchOutcome { accepted: 1, rejected: 2 });
        assert_eq!(node.applied_version, 2);
    }
}
