//! Operator-managed node inventory.
//!
//! Nodes are created and edited here; version and release fields are left to
//! the release service and the agent protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};
use crate::model::{Deleted, Node, NodeType};
use crate::reconcile::NodeState;
use crate::store::index::{hydrate, index_remove, index_upsert};
use crate::store::{create_id, create_token, get_json, keys, put_json, DocumentStore, IndexRow, SharedStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewNode {
    pub name: String,
    pub node_type: String,
    pub region: String,
    pub tags: Vec<String>,
    pub entry_cdn: String,
    pub entry_direct: String,
    pub entry_ip: String,
}

/// Editable operator fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub region: Option<String>,
    pub tags: Option<Vec<String>>,
    pub entry_cdn: Option<String>,
    pub entry_direct: Option<String>,
    pub entry_ip: Option<String>,
}

/// A node as shown to operators, with derived liveness and state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: Node,
    pub online: bool,
    pub state: NodeState,
}

impl NodeView {
    pub fn new(node: Node, now: DateTime<Utc>) -> Self {
        Self {
            online: node.is_online(now),
            state: NodeState::of(&node),
            node,
        }
    }
}

fn index_row(node: &Node) -> IndexRow {
    IndexRow {
        id: node.id.clone(),
        name: Some(node.name.clone()),
        updated_at: Some(node.updated_at.to_rfc3339()),
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct NodeInventory {
    store: SharedStore,
}

impl NodeInventory {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Raw node documents in index order.
    pub async fn all(&self) -> HubResult<Vec<Node>> {
        Ok(hydrate(self.store.as_ref(), keys::IDX_NODES, keys::node).await?)
    }

    /// Every node, sorted by name.
    pub async fn list(&self) -> HubResult<Vec<NodeView>> {
        let mut nodes = self.all().await?;
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        let now = Utc::now();
        Ok(nodes.into_iter().map(|n| NodeView::new(n, now)).collect())
    }

    async fn load(&self, id: &str) -> HubResult<Node> {
        get_json(self.store.as_ref(), &keys::node(id))
            .await?
            .ok_or_else(|| HubError::not_found("Node not found"))
    }

    pub async fn get(&self, id: &str) -> HubResult<NodeView> {
        Ok(NodeView::new(self.load(id).await?, Utc::now()))
    }

    pub async fn create(&self, input: NewNode) -> HubResult<NodeView> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(HubError::validation("name is required"));
        }
        let node_type = NodeType::parse(input.node_type.trim())
            .ok_or_else(|| HubError::validation("node_type must be vps or edge"))?;

        let now = Utc::now();
        let node = Node {
            id: create_id("node"),
            name,
            node_type,
            region: input.region,
            tags: input.tags,
            entry_cdn: input.entry_cdn,
            entry_direct: input.entry_direct,
            entry_ip: input.entry_ip,
            token: create_token(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        put_json(self.store.as_ref(), &keys::node(&node.id), &node).await?;
        index_upsert(self.store.as_ref(), keys::IDX_NODES, index_row(&node)).await?;
        tracing::info!(node_id = %node.id, name = %node.name, node_type = ?node.node_type, "Node created");
        Ok(NodeView::new(node, now))
    }

    pub async fn update(&self, id: &str, patch: NodePatch) -> HubResult<NodeView> {
        let mut node = self.load(id).await?;
        if let Some(name) = patch.name {
            node.name = name;
        }
        if let Some(region) = patch.region {
            node.region = region;
        }
        if let Some(tags) = patch.tags {
            node.tags = tags;
        }
        if let Some(entry_cdn) = patch.entry_cdn {
            node.entry_cdn = entry_cdn;
        }
        if let Some(entry_direct) = patch.entry_direct {
            node.entry_direct = entry_direct;
        }
        if let Some(entry_ip) = patch.entry_ip {
            node.entry_ip = entry_ip;
        }
        node.updated_at = Utc::now();

        put_json(self.store.as_ref(), &keys::node(&node.id), &node).await?;
        index_upsert(self.store.as_ref(), keys::IDX_NODES, index_row(&node)).await?;
        tracing::info!(node_id = %node.id, "Node updated");
        Ok(NodeView::new(node, Utc::now()))
    }

    /// Delete the document and its index row. Deleting an unknown id succeeds.
    pub async fn delete(&self, id: &str) -> HubResult<Deleted> {
        self.store.delete(&keys::node(id)).await?;
        index_remove(self.store.as_ref(), keys::IDX_NODES, id).await?;
        tracing::info!(node_id = %id, "Node deleted");
        Ok(Deleted::new(id))
    }
}
