use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::document::{unique_key, Collection, StoredDocument};
use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, FindQuery, Page};
use crate::DocumentStore;

/// Process-local store with the same semantics as the Postgres backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, HashMap<Uuid, StoredDocument>>>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique<'a>(
    collection: &Collection,
    data: &Value,
    existing: impl Iterator<Item = &'a StoredDocument>,
    skip: Option<Uuid>,
) -> StoreResult<()> {
    let keys: Vec<(&'static str, String)> = collection
        .unique
        .iter()
        .filter_map(|field| unique_key(data, field).map(|key| (*field, key)))
        .collect();
    if keys.is_empty() {
        return Ok(());
    }

    for doc in existing.filter(|d| Some(d.id) != skip) {
        for (field, key) in &keys {
            if doc.unique_key(field).as_deref() == Some(key.as_str()) {
                return Err(StoreError::Conflict {
                    collection: collection.name,
                    field: field.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &Collection, data: Value) -> StoreResult<StoredDocument> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        check_unique(collection, &data, docs.values(), None)?;

        let now = Utc::now();
        let doc = StoredDocument {
            id: Uuid::new_v4(),
            data,
            created_at: now,
            updated_at: now,
        };
        docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, collection: &Collection, id: Uuid) -> StoreResult<Option<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection.name)
            .and_then(|docs| docs.get(&id))
            .cloned())
    }

    async fn get_many(&self, collection: &Collection, ids: &[Uuid]) -> StoreResult<Vec<StoredDocument>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection.name) else {
            return Ok(Vec::new());
        };
        let mut found: Vec<StoredDocument> = ids.iter().filter_map(|id| docs.get(id)).cloned().collect();
        found.sort_by_key(|d| d.id);
        found.dedup_by_key(|d| d.id);
        Ok(found)
    }

    async fn find_one(&self, collection: &Collection, filter: &Filter) -> StoreResult<Option<StoredDocument>> {
        let query = FindQuery::new().with_filter(filter.clone()).with_limit(1);
        Ok(self.find(collection, &query).await?.documents.into_iter().next())
    }

    async fn find(&self, collection: &Collection, query: &FindQuery) -> StoreResult<Page> {
        let collections = self.collections.read().await;
        let mut matching: Vec<&StoredDocument> = collections
            .get(collection.name)
            .map(|docs| docs.values().filter(|d| query.filter.matches(d)).collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as u64;
        let window = matching
            .into_iter()
            .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
            .take(query.limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(Page { documents: window, total })
    }

    async fn count(&self, collection: &Collection, filter: &Filter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection.name)
            .map(|docs| docs.values().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn replace(&self, collection: &Collection, id: Uuid, data: Value) -> StoreResult<Option<StoredDocument>> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection.name) else {
            return Ok(None);
        };
        if !docs.contains_key(&id) {
            return Ok(None);
        }
        check_unique(collection, &data, docs.values(), Some(id))?;

        let Some(doc) = docs.get_mut(&id) else {
            return Ok(None);
        };
        doc.data = data;
        doc.updated_at = Utc::now();
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection.name)
            .map(|docs| docs.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn next_sequence(&self, name: &str) -> StoreResult<u64> {
        let mut sequences = self.sequences.lock().await;
        let value = sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
