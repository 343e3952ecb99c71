use chrono::Utc;

use super::{node_outbounds, render, Outbound, SubscriptionFormat};
use crate::error::{HubError, HubResult};
use crate::inventory::NodeInventory;
use crate::model::{Deleted, NewSubscription, Subscription, SubscriptionPatch};
use crate::observability::metrics;
use crate::store::index::{hydrate, index_remove, index_upsert};
use crate::store::{create_token, get_json, keys, put_json, DocumentStore, IndexRow, SharedStore};

/// A rendered feed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub format: SubscriptionFormat,
    pub body: String,
}

fn index_row(sub: &Subscription) -> IndexRow {
    IndexRow {
        id: sub.token.clone(),
        name: Some(sub.name.clone()),
        updated_at: Some(sub.updated_at.to_rfc3339()),
        ..Default::default()
    }
}

/// Subscription CRUD and feed rendering.
#[derive(Clone)]
pub struct SubscriptionService {
    store: SharedStore,
    inventory: NodeInventory,
}

impl SubscriptionService {
    pub fn new(store: SharedStore, inventory: NodeInventory) -> Self {
        Self { store, inventory }
    }

    /// Newest-updated first.
    pub async fn list(&self) -> HubResult<Vec<Subscription>> {
        let mut subs: Vec<Subscription> =
            hydrate(self.store.as_ref(), keys::IDX_SUBSCRIPTIONS, keys::subscription).await?;
        subs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(subs)
    }

    async fn load(&self, token: &str) -> HubResult<Option<Subscription>> {
        Ok(get_json(self.store.as_ref(), &keys::subscription(token)).await?)
    }

    pub async fn get(&self, token: &str) -> HubResult<Subscription> {
        self.load(token)
            .await?
            .ok_or_else(|| HubError::not_found("Subscription not found"))
    }

    pub async fn create(&self, input: NewSubscription) -> HubResult<Subscription> {
        if input.name.is_empty() {
            return Err(HubError::validation("name is required"));
        }
        let now = Utc::now();
        let sub = Subscription {
            token: create_token(),
            name: input.name,
            enabled: input.enabled.unwrap_or(true),
            visible_node_ids: input.visible_node_ids,
            remark: input.remark,
            created_at: now,
            updated_at: now,
        };
        put_json(self.store.as_ref(), &keys::subscription(&sub.token), &sub).await?;
        index_upsert(self.store.as_ref(), keys::IDX_SUBSCRIPTIONS, index_row(&sub)).await?;
        tracing::info!(name = %sub.name, enabled = sub.enabled, "Subscription created");
        Ok(sub)
    }

    pub async fn update(&self, token: &str, patch: SubscriptionPatch) -> HubResult<Subscription> {
        let mut sub = self.get(token).await?;
        if let Some(name) = patch.name {
            sub.name = name;
        }
        if let Some(enabled) = patch.enabled {
            sub.enabled = enabled;
        }
        if let Some(ids) = patch.visible_node_ids {
            sub.visible_node_ids = ids;
        }
        if let Some(remark) = patch.remark {
            sub.remark = remark;
        }
        sub.updated_at = Utc::now();
        put_json(self.store.as_ref(), &keys::subscription(&sub.token), &sub).await?;
        index_upsert(self.store.as_ref(), keys::IDX_SUBSCRIPTIONS, index_row(&sub)).await?;
        Ok(sub)
    }

    pub async fn delete(&self, token: &str) -> HubResult<Deleted> {
        self.store.delete(&keys::subscription(token)).await?;
        index_remove(self.store.as_ref(), keys::IDX_SUBSCRIPTIONS, token).await?;
        tracing::info!("Subscription deleted");
        Ok(Deleted::new(token))
    }

    /// Outbounds of every node the subscription can see, in node index order.
    pub async fn outbounds(&self, sub: &Subscription) -> HubResult<Vec<Outbound>> {
        let nodes = self.inventory.all().await?;
        Ok(nodes
            .iter()
            .filter(|node| sub.can_see(&node.id))
            .flat_map(node_outbounds)
            .collect())
    }

    /// Render the feed behind `token`.
    ///
    /// `None` when the subscription does not exist or is disabled; callers
    /// must not distinguish the two.
    pub async fn feed(&self, token: &str, format: SubscriptionFormat) -> HubResult<Option<Feed>> {
        let Some(sub) = self.load(token).await?.filter(|s| s.enabled) else {
            return Ok(None);
        };
        let outbounds = self.outbounds(&sub).await?;
        let body = render(format, &sub.name, &outbounds);
        metrics::record_subscription_render(format.as_str());
        tracing::debug!(format = format.as_str(), outbounds = outbounds.len(), "Rendered subscription");
        Ok(Some(Feed { format, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NewNode;
    use crate::model::{DesiredConfig, Node, TemplateSnapshot};
    use crate::store::MemoryStore;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;
    use std::sync::Arc;

    async fn setup() -> (SubscriptionService, NodeInventory, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new(None));
        let inventory = NodeInventory::new(store.clone());
        (SubscriptionService::new(store.clone(), inventory.clone()), inventory, store)
    }

    async fn seed_trojan_node(inventory: &NodeInventory, store: &SharedStore, name: &str) -> String {
        let created = inventory
            .create(NewNode {
                name: name.into(),
                node_type: "vps".into(),
                entry_direct: format!("{name}.example.com"),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut node: Node = created.node;
        node.desired_config = Some(DesiredConfig {
            rev: 1,
            templates: vec![TemplateSnapshot {
                id: "tpl_builtin_trojan_tcp_tls".into(),
                name: "Trojan + TCP + TLS".into(),
                protocol: "trojan".into(),
                transport: "tcp".into(),
                tls_mode: "tls".into(),
                defaults: json!({"port": 443, "password": "p", "sni": ""}).as_object().cloned().unwrap(),
            }],
            ..Default::default()
        });
        put_json(store.as_ref(), &keys::node(&node.id), &node).await.unwrap();
        node.id
    }

    #[tokio::test]
    async fn test_feed_filters_visible_nodes() {
        let (svc, inventory, store) = setup().await;
        let a = seed_trojan_node(&inventory, &store, "alpha").await;
        seed_trojan_node(&inventory, &store, "beta").await;

        let sub = svc
            .create(NewSubscription {
                name: "family".into(),
                visible_node_ids: vec![a],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(sub.enabled);

        let feed = svc.feed(&sub.token, SubscriptionFormat::V2ray).await.unwrap().unwrap();
        let text = String::from_utf8(STANDARD.decode(feed.body).unwrap()).unwrap();
        assert_eq!(
            text,
            "trojan://p@alpha.example.com:443?type=tcp&security=tls&sni=&fp=chrome#alpha"
        );
    }

    #[tokio::test]
    async fn test_disabled_and_unknown_feeds() {
        let (svc, _, _) = setup().await;
        assert!(svc.feed("nope", SubscriptionFormat::V2ray).await.unwrap().is_none());

        let sub = svc
            .create(NewSubscription {
                name: "off".into(),
                enabled: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(svc.feed(&sub.token, SubscriptionFormat::Clash).await.unwrap().is_none());

        let patched = svc
            .update(
                &sub.token,
                SubscriptionPatch {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(patched.enabled);
        let feed = svc.feed(&sub.token, SubscriptionFormat::Clash).await.unwrap().unwrap();
        assert!(feed.body.starts_with("# NodeHub subscription (clash)\n# name=off\n"));
    }

    #[tokio::test]
    async fn test_crud() {
        let (svc, _, _) = setup().await;
        let err = svc.create(NewSubscription::default()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let first = svc
            .create(NewSubscription {
                name: "one".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = svc
            .create(NewSubscription {
                name: "two".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        svc.update(
            &first.token,
            SubscriptionPatch {
                remark: Some("vip".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let listed = svc.list().await.unwrap();
        assert_eq!(listed[0].token, first.token);
        assert_eq!(listed[0].remark, "vip");

        svc.delete(&second.token).await.unwrap();
        assert_eq!(svc.list().await.unwrap().len(), 1);
        assert_eq!(svc.get(&second.token).await.unwrap_err().code(), "NOT_FOUND");
    }
}
