//! Template resolution: builtins merged with stored overrides, plus custom
//! templates stored as whole documents.

use chrono::Utc;

use crate::error::{HubError, HubResult};
use crate::model::{Defaults, Deleted, NewTemplate, NodeType, Template, TemplateKind, TemplateOverride, TemplatePatch};
use crate::store::index::{hydrate, index_remove, index_upsert};
use crate::store::{create_id, get_json, keys, put_json, DocumentStore, IndexRow, SharedStore};
use crate::templates::builtin::{find_builtin, BuiltinTemplate, TemplateOptions, BUILTIN_TEMPLATES, TEMPLATE_OPTIONS};
use crate::templates::defaults::apply_defaults;

/// Where a template id points.
#[derive(Debug)]
pub enum TemplateSource {
    Builtin(&'static BuiltinTemplate),
    Custom(Template),
}

/// Read/write access to templates.
#[derive(Clone)]
pub struct TemplateRegistry {
    store: SharedStore,
}

impl TemplateRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn options(&self) -> &'static TemplateOptions {
        &TEMPLATE_OPTIONS
    }

    async fn lookup(&self, id: &str) -> HubResult<Option<TemplateSource>> {
        if let Some(base) = find_builtin(id) {
            return Ok(Some(TemplateSource::Builtin(base)));
        }
        let custom: Option<Template> = get_json(self.store.as_ref(), &keys::template(id)).await?;
        Ok(custom.map(TemplateSource::Custom))
    }

    /// Resolve a template id, or `None` if unknown.
    pub async fn resolve(&self, id: &str) -> HubResult<Option<Template>> {
        match self.lookup(id).await? {
            Some(TemplateSource::Builtin(base)) => Ok(Some(self.resolve_builtin(base).await?)),
            Some(TemplateSource::Custom(template)) => Ok(Some(template)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> HubResult<Template> {
        self.resolve(id)
            .await?
            .ok_or_else(|| HubError::not_found("Template not found"))
    }

    /// Merge the override and run the defaults engine. Fields the engine had
    /// to fill are written back into the override so later reads (and later
    /// releases) see the same generated secrets.
    async fn resolve_builtin(&self, base: &'static BuiltinTemplate) -> HubResult<Template> {
        let key = keys::template_override(base.id);
        let stored: Option<TemplateOverride> = get_json(self.store.as_ref(), &key).await?;
        let mut merged = match &stored {
            Some(ov) => ov.apply_to(base.to_template()),
            None => base.to_template(),
        };

        let filled = apply_defaults(&merged.protocol, &merged.transport, &merged.tls_mode, &merged.defaults);
        let newly_filled: Defaults = filled
            .iter()
            .filter(|(k, v)| merged.defaults.get(k.as_str()) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !newly_filled.is_empty() {
            let mut ov = stored.unwrap_or_default();
            let fields: Vec<String> = newly_filled.keys().cloned().collect();
            ov.defaults.extend(newly_filled);
            put_json(self.store.as_ref(), &key, &ov).await?;
            tracing::debug!(template_id = %base.id, ?fields, "Persisted generated template defaults");
        }

        merged.defaults = filled;
        Ok(merged)
    }

    /// Builtins (with overrides) followed by custom templates, sorted by kind
    /// then name.
    pub async fn list(&self) -> HubResult<Vec<Template>> {
        let mut all = Vec::with_capacity(BUILTIN_TEMPLATES.len());
        for base in BUILTIN_TEMPLATES {
            all.push(self.resolve_builtin(base).await?);
        }
        let custom: Vec<Template> = hydrate(self.store.as_ref(), keys::IDX_TEMPLATES, keys::template).await?;
        all.extend(custom);
        all.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(all)
    }

    pub async fn create(&self, input: NewTemplate) -> HubResult<Template> {
        let name = input.name.trim().to_string();
        let protocol = input.protocol.trim().to_string();
        let transport = input.transport.trim().to_string();
        let tls_mode = input.tls_mode.trim().to_string();

        if name.is_empty() {
            return Err(HubError::validation("name is required"));
        }
        if protocol.is_empty() {
            return Err(HubError::validation("protocol is required"));
        }
        if transport.is_empty() {
            return Err(HubError::validation("transport is required"));
        }
        if tls_mode.is_empty() {
            return Err(HubError::validation("tls_mode is required"));
        }
        if !TEMPLATE_OPTIONS.knows(&protocol, &transport, &tls_mode) {
            return Err(HubError::validation("Unknown protocol/transport/tls_mode"));
        }

        let now = Utc::now();
        let defaults = apply_defaults(&protocol, &transport, &tls_mode, &input.defaults.unwrap_or_default());
        let node_types = if input.node_types.is_empty() {
            vec![NodeType::Vps, NodeType::Edge]
        } else {
            input.node_types
        };

        let template = Template {
            id: create_id("tpl"),
            kind: TemplateKind::Custom,
            name,
            protocol,
            transport,
            tls_mode,
            node_types,
            description: input.description,
            defaults,
            created_at: Some(now),
            updated_at: Some(now),
        };

        put_json(self.store.as_ref(), &keys::template(&template.id), &template).await?;
        index_upsert(self.store.as_ref(), keys::IDX_TEMPLATES, index_row(&template)).await?;
        tracing::info!(template_id = %template.id, protocol = %template.protocol, "Custom template created");
        Ok(template)
    }

    pub async fn update(&self, id: &str, patch: TemplatePatch) -> HubResult<Template> {
        match self.lookup(id).await? {
            Some(TemplateSource::Builtin(base)) => {
                let key = keys::template_override(base.id);
                let mut ov: TemplateOverride = get_json(self.store.as_ref(), &key).await?.unwrap_or_default();
                if let Some(name) = patch.name {
                    ov.name = Some(name);
                }
                if let Some(description) = patch.description {
                    ov.description = Some(description);
                }
                if let Some(defaults) = patch.defaults {
                    ov.defaults.extend(defaults);
                }
                ov.updated_at = Some(Utc::now());
                put_json(self.store.as_ref(), &key, &ov).await?;
                tracing::info!(template_id = %base.id, "Builtin template override updated");
                self.resolve_builtin(base).await
            }
            Some(TemplateSource::Custom(mut current)) => {
                if let Some(name) = patch.name {
                    current.name = name;
                }
                if let Some(description) = patch.description {
                    current.description = description;
                }
                if let Some(defaults) = patch.defaults {
                    current.defaults = defaults;
                }
                if let Some(node_types) = patch.node_types {
                    current.node_types = node_types;
                }
                current.defaults =
                    apply_defaults(&current.protocol, &current.transport, &current.tls_mode, &current.defaults);
                current.updated_at = Some(Utc::now());

                put_json(self.store.as_ref(), &keys::template(&current.id), &current).await?;
                index_upsert(self.store.as_ref(), keys::IDX_TEMPLATES, index_row(&current)).await?;
                tracing::info!(template_id = %current.id, "Custom template updated");
                Ok(current)
            }
            None => Err(HubError::not_found("Template not found")),
        }
    }

    /// Builtins are reset to their code defaults; custom templates are removed.
    pub async fn delete(&self, id: &str) -> HubResult<Deleted> {
        if let Some(base) = find_builtin(id) {
            self.store.delete(&keys::template_override(base.id)).await?;
            tracing::info!(template_id = %id, "Builtin template reset");
            return Ok(Deleted {
                deleted: id.to_string(),
                action: Some("reset_builtin"),
            });
        }

        self.store.delete(&keys::template(id)).await?;
        index_remove(self.store.as_ref(), keys::IDX_TEMPLATES, id).await?;
        tracing::info!(template_id = %id, "Custom template deleted");
        Ok(Deleted::new(id))
    }
}

fn index_row(template: &Template) -> IndexRow {
    IndexRow {
        id: template.id.clone(),
        name: Some(template.name.clone()),
        updated_at: template.updated_at.map(|t| t.to_rfc3339()),
        ..Default::default()
    }
}
