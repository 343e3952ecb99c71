//! Stored document types.
//!
//! All documents deserialize with `#[serde(default)]` so records written by
//! older versions (or partially edited by hand) still load.

pub mod node;
pub mod release;
pub mod subscription;
pub mod template;

pub use node::{DesiredConfig, Node, NodeType, ReleaseStatus, TemplateSnapshot};
pub use release::{NewRelease, Release, ReleaseOutcome, ReleaseResult};
pub use subscription::{NewSubscription, Subscription, SubscriptionPatch};
pub use template::{Defaults, NewTemplate, Template, TemplateKind, TemplateOverride, TemplatePatch};

use serde::Serialize;

/// Result of a delete operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deleted {
    pub deleted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

impl Deleted {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            deleted: id.into(),
            action: None,
        }
    }
}
