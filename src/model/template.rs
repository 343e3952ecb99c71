//! Template documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::node::NodeType;

/// Free-form template defaults / release params.
pub type Defaults = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Builtin,
    #[default]
    Custom,
}

/// A fully resolved template, as returned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub id: String,
    pub kind: TemplateKind,
    pub name: String,
    pub protocol: String,
    pub transport: String,
    pub tls_mode: String,
    pub node_types: Vec<NodeType>,
    pub description: String,
    pub defaults: Defaults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sparse operator patch stored on top of a builtin template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub defaults: Defaults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TemplateOverride {
    /// Apply this override to a builtin template.
    ///
    /// Name and description win when non-empty; defaults are merged one
    /// level deep with override keys winning.
    pub fn apply_to(&self, mut base: Template) -> Template {
        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            base.name = name.to_string();
        }
        if let Some(desc) = self.description.as_deref().filter(|s| !s.is_empty()) {
            base.description = desc.to_string();
        }
        for (k, v) in &self.defaults {
            base.defaults.insert(k.clone(), v.clone());
        }
        if self.updated_at.is_some() {
            base.updated_at = self.updated_at;
        }
        base
    }
}

/// Operator input for a new custom template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTemplate {
    pub name: String,
    pub protocol: String,
    pub transport: String,
    pub tls_mode: String,
    pub node_types: Vec<NodeType>,
    pub description: String,
    pub defaults: Option<Defaults>,
}

/// Operator patch for an existing template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub defaults: Option<Defaults>,
    pub node_types: Option<Vec<NodeType>>,
}
