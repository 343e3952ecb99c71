//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid development config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration of the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HubConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Shared admin secret.
    pub admin: AdminConfig,

    /// Document store settings.
    pub store: StoreConfig,

    /// Public subscription settings.
    pub subscription: SubscriptionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Value expected in `X-Admin-Key`. Empty disables the admin API.
    /// Overridden by `NODEHUB_ADMIN_KEY`.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file. In-memory only when unset.
    pub snapshot_path: Option<PathBuf>,

    /// Rewrite the snapshot after every write instead of only on shutdown.
    pub persist_on_write: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Public base URL for feed links. Falls back to the request origin.
    pub base_url: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "nodehub=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum accepted request body, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
        }
    }
}

/// Configuration of the node agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the control plane, e.g. `http://hub.example.com:8080`.
    pub control_plane_url: String,

    pub node_id: String,

    /// Value sent as `X-Node-Token`.
    pub node_token: String,

    pub heartbeat_interval_secs: u64,

    pub reconcile_interval_secs: u64,

    pub request_timeout_secs: u64,

    /// Where `desired.json`, the applied version and the event queue live.
    pub state_dir: PathBuf,

    /// Reported in heartbeats.
    pub protocol_app_version: String,

    /// Reported in heartbeats.
    pub deploy_info: String,

    pub observability: ObservabilityConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_plane_url: "http://127.0.0.1:8080".to_string(),
            node_id: String::new(),
            node_token: String::new(),
            heartbeat_interval_secs: 30,
            reconcile_interval_secs: 15,
            request_timeout_secs: 10,
            state_dir: PathBuf::from("/var/lib/nodehub-agent"),
            protocol_app_version: String::new(),
            deploy_info: String::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses() {
        let config: HubConfig = toml::from_str(
            r#"
            [admin]
            api_key = "k"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.admin.api_key, "k");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.store.snapshot_path.is_none());
    }

    #[test]
    fn test_agent_defaults() {
        let config: AgentConfig = toml::from_str("node_id = \"node_1\"").unwrap();
        assert_eq!(config.node_id, "node_1");
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.reconcile_interval_secs, 15);
    }
}
