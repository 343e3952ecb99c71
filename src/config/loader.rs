//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{AgentConfig, HubConfig};
use crate::config::validation::{validate_agent_config, validate_config, ValidationError};

/// Environment variable that overrides `admin.api_key`.
pub const ADMIN_KEY_ENV: &str = "NODEHUB_ADMIN_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides on top of a parsed config.
pub fn apply_env_overrides(config: &mut HubConfig) {
    if let Ok(key) = std::env::var(ADMIN_KEY_ENV) {
        if !key.is_empty() {
            config.admin.api_key = key;
        }
    }
}

/// Load and validate the control-plane configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HubConfig, ConfigError> {
    let mut config: HubConfig = read_toml(path)?;
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse the agent configuration without validating it, so command-line
/// flags can fill in missing fields first.
pub fn parse_agent_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    read_toml(path)
}

/// Load and validate the agent configuration from a TOML file.
pub fn load_agent_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let config = parse_agent_config(path)?;
    validate_agent_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
