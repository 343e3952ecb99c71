use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;

use crate::error::{HubError, HubResult};
use crate::model::{
    Defaults, DesiredConfig, NewRelease, Node, Release, ReleaseOutcome, ReleaseResult, ReleaseStatus,
    Template, TemplateSnapshot,
};
use crate::observability::metrics;
use crate::store::index::{hydrate, index_upsert, read_index, write_index};
use crate::store::{create_id, get_json, keys, put_json, DocumentStore, IndexRow, SharedStore};
use crate::templates::TemplateRegistry;

/// Number of release records kept.
pub const RELEASE_RETENTION: usize = 10;

const MODE_DIRECT_APPLY: &str = "direct_apply";

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human-readable digest, e.g. `v3: Hysteria2, Trojan | params: sni=a.com`.
pub fn summarize(version: u64, template_names: &[String], params: &Defaults) -> String {
    let mut summary = format!("v{}: {}", version, template_names.join(", "));
    if !params.is_empty() {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        let pairs: Vec<String> = keys
            .into_iter()
            .map(|k| format!("{}={}", k, param_text(&params[k.as_str()])))
            .collect();
        summary.push_str(" | params: ");
        summary.push_str(&pairs.join(", "));
    }
    summary
}

fn snapshot(template: &Template) -> TemplateSnapshot {
    TemplateSnapshot {
        id: template.id.clone(),
        name: template.name.clone(),
        protocol: template.protocol.clone(),
        transport: template.transport.clone(),
        tls_mode: template.tls_mode.clone(),
        defaults: template.defaults.clone(),
    }
}

#[derive(Clone)]
pub struct ReleaseService {
    store: SharedStore,
    registry: TemplateRegistry,
}

impl ReleaseService {
    pub fn new(store: SharedStore, registry: TemplateRegistry) -> Self {
        Self { store, registry }
    }

    /// All kept releases, newest first.
    pub async fn list_releases(&self) -> HubResult<Vec<Release>> {
        let mut releases: Vec<Release> = hydrate(self.store.as_ref(), keys::IDX_RELEASES, keys::release).await?;
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(releases)
    }

    /// Queue a new desired config on every listed node.
    ///
    /// Unknown nodes are reported per node and never fail the release.
    pub async fn create_release(&self, input: NewRelease) -> HubResult<Release> {
        if input.node_ids.is_empty() {
            return Err(HubError::validation("node_ids must be a non-empty array"));
        }
        if input.template_ids.is_empty() {
            return Err(HubError::validation("template_ids must be a non-empty array"));
        }
        let params = match input.params {
            Value::Object(map) => map,
            _ => Defaults::new(),
        };

        let resolved = join_all(input.template_ids.iter().map(|id| self.registry.resolve(id))).await;
        let mut templates = Vec::with_capacity(resolved.len());
        for template in resolved {
            if let Some(template) = template? {
                templates.push(template);
            }
        }
        if templates.is_empty() {
            return Err(HubError::validation("No valid templates found"));
        }

        let rows = read_index(self.store.as_ref(), keys::IDX_RELEASES).await?;
        let version = rows.iter().filter_map(|r| r.version).max().unwrap_or(0) + 1;
        let id = create_id("rel");
        let now = Utc::now();

        let template_ids: Vec<String> = templates.iter().map(|t| t.id.clone()).collect();
        let template_names: Vec<String> = templates.iter().map(|t| t.name.clone()).collect();
        let summary = summarize(version, &template_names, &params);
        let desired = DesiredConfig {
            rev: version,
            template_ids: template_ids.clone(),
            template_names: template_names.clone(),
            templates: templates.iter().map(snapshot).collect(),
            params: params.clone(),
            operation_id: id.clone(),
            created_at: now,
        };

        let mut results = Vec::with_capacity(input.node_ids.len());
        for node_id in &input.node_ids {
            let key = keys::node(node_id);
            let Some(mut node) = get_json::<Node>(self.store.as_ref(), &key).await? else {
                tracing::warn!(release = %id, node_id = %node_id, "Release target not found");
                results.push(ReleaseResult {
                    node_id: node_id.clone(),
                    node_name: None,
                    status: ReleaseOutcome::Failed,
                    desired_version: None,
                    reason: Some("node not found".to_string()),
                });
                continue;
            };

            node.desired_version = version;
            node.desired_config = Some(desired.clone());
            node.desired_config_summary = summary.clone();
            node.last_release_status = ReleaseStatus::Pending;
            node.last_release_message = format!("release queued v{version}");
            node.updated_at = now;
            put_json(self.store.as_ref(), &key, &node).await?;

            results.push(ReleaseResult {
                node_id: node.id.clone(),
                node_name: Some(node.name.clone()),
                status: ReleaseOutcome::Queued,
                desired_version: Some(version),
                reason: None,
            });
        }

        let release = Release {
            id: id.clone(),
            version,
            mode: MODE_DIRECT_APPLY.to_string(),
            node_ids: input.node_ids,
            template_ids,
            template_names,
            summary,
            params,
            results,
            created_at: now,
        };
        put_json(self.store.as_ref(), &keys::release(&id), &release).await?;
        index_upsert(
            self.store.as_ref(),
            keys::IDX_RELEASES,
            IndexRow {
                id: id.clone(),
                version: Some(version),
                created_at: Some(now.to_rfc3339()),
                ..Default::default()
            },
        )
        .await?;
        self.prune().await?;

        metrics::record_release();
        tracing::info!(
            release = %id,
            version,
            nodes = release.node_ids.len(),
            queued = release.results.iter().filter(|r| r.status == ReleaseOutcome::Queued).count(),
            "Release created"
        );
        Ok(release)
    }

    /// Keep only the newest releases, deleting the dropped records.
    async fn prune(&self) -> HubResult<()> {
        let mut rows = read_index(self.store.as_ref(), keys::IDX_RELEASES).await?;
        if rows.len() <= RELEASE_RETENTION {
            return Ok(());
        }
        rows.sort_by(|a, b| b.version.unwrap_or(0).cmp(&a.version.unwrap_or(0)));
        let dropped = rows.split_off(RELEASE_RETENTION);
        write_index(self.store.as_ref(), keys::IDX_RELEASES, &rows).await?;
        for row in &dropped {
            self.store.delete(&keys::release(&row.id)).await?;
        }
        tracing::debug!(pruned = dropped.len(), "Pruned old releases");
        Ok(())
    }
}
