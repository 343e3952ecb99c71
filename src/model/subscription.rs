//! Subscription documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A capability token granting read access to rendered node configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub token: String,
    pub name: String,
    pub enabled: bool,
    /// Empty means every node is visible.
    pub visible_node_ids: Vec<String>,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn can_see(&self, node_id: &str) -> bool {
        self.visible_node_ids.is_empty() || self.visible_node_ids.iter().any(|id| id == node_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSubscription {
    pub name: String,
    pub enabled: Option<bool>,
    pub visible_node_ids: Vec<String>,
    pub remark: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionPatch {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub visible_node_ids: Option<Vec<String>>,
    pub remark: Option<String>,
}
