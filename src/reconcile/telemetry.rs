//! Heartbeat telemetry sanitization.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::HeartbeatReport;
use crate::model::Node;

/// Maximum length, in chars, of any free-text field reported by an agent.
pub const MAX_TEXT_CHARS: usize = 512;

const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);
// 1 TiB expressed in MiB.
const MEMORY_MB_RANGE: (f64, f64) = (0.0, 1_048_576.0);

/// Trim and cut to `MAX_TEXT_CHARS` characters.
pub fn clip_text(raw: &str) -> String {
    raw.trim().chars().take(MAX_TEXT_CHARS).collect()
}

/// A finite number from a JSON number or numeric string.
pub fn as_finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Free text from a JSON scalar. Numbers and booleans are rendered as
/// text; arrays, objects and null read as empty.
pub fn as_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => clip_text(s),
        Some(Value::Number(n)) => clip_text(&n.to_string()),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn metric(value: Option<&Value>, (min, max): (f64, f64)) -> Option<f64> {
    let n = as_finite(value?)?;
    if n < min || n > max {
        return None;
    }
    Some((n * 100.0).round() / 100.0)
}

/// Overwrite the node's telemetry with a sanitized report.
///
/// Every field is replaced, so a metric the agent stopped sending reads as
/// null instead of a stale value.
pub fn apply_report(node: &mut Node, report: &HeartbeatReport, now: DateTime<Utc>) {
    node.cpu_usage_percent = metric(report.cpu_usage_percent.as_ref(), PERCENT_RANGE);
    node.memory_usage_percent = metric(report.memory_usage_percent.as_ref(), PERCENT_RANGE);
    node.memory_used_mb = metric(report.memory_used_mb.as_ref(), MEMORY_MB_RANGE);
    node.memory_total_mb = metric(report.memory_total_mb.as_ref(), MEMORY_MB_RANGE);

    node.protocol_app_version = as_text(report.protocol_app_version.as_ref());
    node.deploy_info = as_text(report.deploy_info.as_ref());
    node.last_heartbeat_error = as_text(report.last_heartbeat_error.as_ref());

    node.heartbeat_reported_at = Some(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metrics_validated_and_rounded() {
        let report = HeartbeatReport {
            cpu_usage_percent: Some(json!(12.3456)),
            memory_usage_percent: Some(json!(140)),
            memory_used_mb: Some(json!("2048.006")),
            memory_total_mb: Some(json!("lots")),
            ..Default::default()
        };
        let mut node = Node {
            memory_total_mb: Some(4096.0),
            ..Default::default()
        };
        let now = Utc::now();
        apply_report(&mut node, &report, now);

        assert_eq!(node.cpu_usage_percent, Some(12.35));
        assert_eq!(node.memory_usage_percent, None);
        assert_eq!(node.memory_used_mb, Some(2048.01));
        assert_eq!(node.memory_total_mb, None);
        assert_eq!(node.heartbeat_reported_at, Some(now));
    }

    #[test]
    fn test_range_edges() {
        assert_eq!(metric(Some(&json!(0)), PERCENT_RANGE), Some(0.0));
        assert_eq!(metric(Some(&json!(100)), PERCENT_RANGE), Some(100.0));
        assert_eq!(metric(Some(&json!(-0.5)), PERCENT_RANGE), None);
        assert_eq!(metric(Some(&json!(1_048_577)), MEMORY_MB_RANGE), None);
        assert_eq!(metric(Some(&json!(true)), PERCENT_RANGE), None);
        assert_eq!(metric(None, PERCENT_RANGE), None);
    }

    #[test]
    fn test_text_fields_trimmed_and_clipped() {
        let long = "x".repeat(600);
        let report = HeartbeatReport {
            protocol_app_version: Some("  sing-box 1.9  ".into()),
            last_heartbeat_error: Some(long.into()),
            ..Default::default()
        };
        let mut node = Node::default();
        apply_report(&mut node, &report, Utc::now());

        assert_eq!(node.protocol_app_version, "sing-box 1.9");
        assert_eq!(node.last_heartbeat_error.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(node.deploy_info, "");
    }

    #[test]
    fn test_mistyped_text_fields_do_not_drop_metrics() {
        let report = HeartbeatReport {
            cpu_usage_percent: Some(json!(12.5)),
            protocol_app_version: Some(json!(190)),
            deploy_info: Some(json!({"kind": "docker"})),
            last_heartbeat_error: Some(json!(false)),
            ..Default::default()
        };
        let mut node = Node {
            deploy_info: "systemd".into(),
            ..Default::default()
        };
        let now = Utc::now();
        apply_report(&mut node, &report, now);

        assert_eq!(node.cpu_usage_percent, Some(12.5));
        assert_eq!(node.protocol_app_version, "190");
        assert_eq!(node.deploy_info, "");
        assert_eq!(node.last_heartbeat_error, "false");
        assert_eq!(node.heartbeat_reported_at, Some(now));
    }

    #[test]
    fn test_clip_counts_chars_not_bytes() {
        let s = "é".repeat(600);
        assert_eq!(clip_text(&s).chars().count(), MAX_TEXT_CHARS);
    }
}
