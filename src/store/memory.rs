//! In-memory document store with optional JSON snapshot persistence.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{DocumentStore, StoreResult};

/// A thread-safe document map, optionally snapshotted to a file.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Value>>,
    snapshot_path: Option<PathBuf>,
    persist_on_write: bool,
    // Serializes snapshot writes so an older snapshot never lands last.
    write_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Create an empty store. `snapshot_path` is only used by `save_to_file`.
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            snapshot_path,
            persist_on_write: false,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Write the snapshot after every put/delete.
    pub fn with_persist_on_write(mut self, enabled: bool) -> Self {
        self.persist_on_write = enabled;
        self
    }

    /// Load from a snapshot file if it exists.
    pub fn load_from_file(path: &Path) -> StoreResult<Self> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let map: BTreeMap<String, Value> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            tracing::info!(path = ?path, documents = store.inner.len(), "Loaded store snapshot");
        }
        Ok(store)
    }

    /// Write the snapshot synchronously. Used on shutdown.
    pub fn save_to_file(&self) -> StoreResult<()> {
        if let Some(path) = &self.snapshot_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer(writer, &self.snapshot())?;
            tracing::info!(path = ?path, documents = self.inner.len(), "Saved store snapshot");
        }
        Ok(())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    async fn persist(&self) -> StoreResult<()> {
        if !self.persist_on_write {
            return Ok(());
        }
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec(&self.snapshot())?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        self.inner.insert(key.to_string(), value);
        self.persist().await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key);
        self.persist().await
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .inner
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
