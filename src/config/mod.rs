//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, NODEHUB_ADMIN_KEY override)
//!     → validation.rs (semantic checks)
//!     → HubConfig / AgentConfig
//!
//! On file change (control plane only):
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → HttpServer swaps the ArcSwap<HubConfig>
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload that fails validation keeps the running config

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_agent_config, load_config, parse_agent_config, ConfigError};
pub use schema::{AgentConfig, HubConfig, LogFormat, ObservabilityConfig};
