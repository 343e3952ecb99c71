//! Document store subsystem.
//!
//! # Data Flow
//! ```text
//! service call
//!     → keys (node:{id}, template:{id}, idx:nodes, ...)
//!     → DocumentStore::get / put / delete (one document per call)
//!     → memory.rs (DashMap, optional JSON snapshot on disk)
//! ```
//!
//! # Design Decisions
//! - No transactions: each call reads or writes exactly one document
//! - Concurrent writers to the same key race, last write wins
//! - Documents are JSON values; typed access goes through `get_json`/`put_json`

pub mod index;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use index::IndexRow;
pub use memory::MemoryStore;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A key/value mapping of JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Store handle shared by every service.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Read and deserialize a document.
///
/// A document that no longer matches the expected shape is treated as absent
/// and logged, so one corrupt record never takes down a listing.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => match serde_json::from_value(value) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping malformed document");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Serialize and write a document.
pub async fn put_json<T: Serialize>(store: &dyn DocumentStore, key: &str, doc: &T) -> StoreResult<()> {
    let value = serde_json::to_value(doc)?;
    store.put(key, value).await
}

/// Document key layout.
pub mod keys {
    pub const IDX_NODES: &str = "idx:nodes";
    pub const IDX_TEMPLATES: &str = "idx:templates";
    pub const IDX_SUBSCRIPTIONS: &str = "idx:subscriptions";
    pub const IDX_RELEASES: &str = "idx:releases";

    pub fn node(id: &str) -> String {
        format!("node:{id}")
    }

    pub fn template(id: &str) -> String {
        format!("template:{id}")
    }

    pub fn template_override(id: &str) -> String {
        format!("template_override:{id}")
    }

    pub fn subscription(token: &str) -> String {
        format!("subscription:{token}")
    }

    pub fn release(id: &str) -> String {
        format!("release:{id}")
    }
}

/// Short prefixed id, e.g. `node_3f2a9c01d4e5`.
pub fn create_id(prefix: &str) -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &simple[..12])
}

/// 32 hex chars of randomness, used for node tokens and subscription tokens.
pub fn create_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
