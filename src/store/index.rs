//! Index documents: small arrays listing the ids of one document family.

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{get_json, put_json, DocumentStore, StoreResult};

/// One entry of an index document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexRow {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

pub async fn read_index(store: &dyn DocumentStore, key: &str) -> StoreResult<Vec<IndexRow>> {
    Ok(get_json(store, key).await?.unwrap_or_default())
}

pub async fn write_index(store: &dyn DocumentStore, key: &str, rows: &[IndexRow]) -> StoreResult<()> {
    put_json(store, key, &rows).await
}

/// Replace (or append) the row with the same id.
pub async fn index_upsert(store: &dyn DocumentStore, key: &str, row: IndexRow) -> StoreResult<()> {
    let mut rows = read_index(store, key).await?;
    rows.retain(|item| item.id != row.id);
    rows.push(row);
    write_index(store, key, &rows).await
}

pub async fn index_remove(store: &dyn DocumentStore, key: &str, id: &str) -> StoreResult<()> {
    let mut rows = read_index(store, key).await?;
    rows.retain(|item| item.id != id);
    write_index(store, key, &rows).await
}

/// Load every document listed in an index, in index order.
///
/// Rows whose document is missing are skipped.
pub async fn hydrate<T, F>(store: &dyn DocumentStore, index_key: &str, key_for: F) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&str) -> String,
{
    let rows = read_index(store, index_key).await?;
    let keys: Vec<String> = rows.iter().map(|row| key_for(&row.id)).collect();
    let docs = join_all(keys.iter().map(|key| get_json::<T>(store, key))).await;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if let Some(doc) = doc? {
            out.push(doc);
        }
    }
    Ok(out)
}
