//! NodeHub control plane library.
//!
//! Operators register relay nodes and templates, push releases, and hand
//! out subscription links; node agents poll for their desired config and
//! report what they applied.

pub mod admin;
pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod inventory;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod reconcile;
pub mod releases;
pub mod store;
pub mod subscription;
pub mod templates;

pub use config::{AgentConfig, HubConfig};
pub use error::{HubError, HubResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
