//! Configuration validation.
//!
//! Semantic checks only; serde already handled the syntax. Every check runs
//! so operators see all problems at once.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AgentConfig, HubConfig};

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{value}'")));
    }
}

pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.store.persist_on_write && config.store.snapshot_path.is_none() {
        errors.push(ValidationError::new(
            "store.persist_on_write",
            "requires store.snapshot_path",
        ));
    }
    let base = &config.subscription.base_url;
    if !base.is_empty() && url::Url::parse(base).is_err() {
        errors.push(ValidationError::new("subscription.base_url", format!("invalid URL '{base}'")));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_agent_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.control_plane_url).is_err() {
        errors.push(ValidationError::new(
            "control_plane_url",
            format!("invalid URL '{}'", config.control_plane_url),
        ));
    }
    if config.node_id.trim().is_empty() {
        errors.push(ValidationError::new("node_id", "is required"));
    }
    if config.node_token.trim().is_empty() {
        errors.push(ValidationError::new("node_token", "is required"));
    }
    for (field, value) in [
        ("heartbeat_interval_secs", config.heartbeat_interval_secs),
        ("reconcile_interval_secs", config.reconcile_interval_secs),
        ("request_timeout_secs", config.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
