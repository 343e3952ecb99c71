//! Subscription feeds.
//!
//! # Data Flow
//! ```text
//! GET /sub/{token}?format=
//!     → service.rs (subscription lookup, visible nodes)
//!     → outbound.rs (desired_config → Outbound per template)
//!     → v2ray.rs | clash.rs (+ yaml.rs) | singbox.rs
//! ```
//!
//! # Design Decisions
//! - Renderers are total: missing optional settings fall back to defaults
//! - Protocols a format cannot express are left out of that feed

pub mod clash;
pub mod outbound;
pub mod service;
pub mod singbox;
pub mod v2ray;
pub mod yaml;

pub use outbound::{node_outbounds, Outbound};
pub use service::SubscriptionService;

/// Client wire format of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionFormat {
    #[default]
    V2ray,
    Clash,
    Singbox,
}

impl SubscriptionFormat {
    /// Unknown or absent formats fall back to v2ray.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("clash") => SubscriptionFormat::Clash,
            Some("singbox") | Some("sing-box") => SubscriptionFormat::Singbox,
            _ => SubscriptionFormat::V2ray,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionFormat::V2ray => "v2ray",
            SubscriptionFormat::Clash => "clash",
            SubscriptionFormat::Singbox => "singbox",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            SubscriptionFormat::V2ray => "text/plain; charset=utf-8",
            SubscriptionFormat::Clash => "text/yaml; charset=utf-8",
            SubscriptionFormat::Singbox => "application/json; charset=utf-8",
        }
    }
}

/// Render outbounds in the requested format.
pub fn render(format: SubscriptionFormat, sub_name: &str, outbounds: &[Outbound]) -> String {
    match format {
        SubscriptionFormat::V2ray => v2ray::render(outbounds),
        SubscriptionFormat::Clash => clash::render(sub_name, outbounds),
        SubscriptionFormat::Singbox => singbox::render(outbounds),
    }
}
