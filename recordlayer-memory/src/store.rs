//! In-memory storage implementation for record stores.
//!
//! Records live in nested hash maps (collection name, then record identity) behind a single
//! async-aware read-write lock. Conditional writes check their precondition while holding the
//! write lock, so they are atomic with respect to every other writer.

use async_trait::async_trait;
use bson::Bson;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::trace;

use recordlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder, WriteCondition},
    error::{RecordStoreError, RecordStoreResult},
    query::Query,
    record::{Record, get_path, values_equal},
};

use crate::evaluator::{RecordEvaluator, sort_records};

type CollectionMap = HashMap<String, Record>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory record storage backend.
///
/// `InMemoryStore` is cheap to clone; clones share the same underlying data. Queries scan the
/// whole collection.
///
/// # Example
///
/// ```ignore
/// use recordlayer_memory::InMemoryStore;
/// use recordlayer_core::backend::{StoreBackend, WriteCondition};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store
///     .put_record("u1", doc! { "id": "u1" }, WriteCondition::NotExists, "users")
///     .await?;
/// assert!(store.get_record("u1", "users").await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of records in `collection`, zero if it does not exist.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

fn check_condition(
    records: &CollectionMap,
    id: &str,
    condition: &WriteCondition,
    collection: &str,
) -> RecordStoreResult<()> {
    match condition {
        WriteCondition::Always => Ok(()),
        WriteCondition::NotExists => {
            if records.contains_key(id) {
                Err(RecordStoreError::RecordAlreadyExists(
                    id.to_string(),
                    collection.to_string(),
                ))
            } else {
                Ok(())
            }
        }
        WriteCondition::VersionEquals { field, value } => {
            let holds = records
                .get(id)
                .is_some_and(|stored| match get_path(stored, field) {
                    Some(current) => values_equal(current, value),
                    None => matches!(value, Bson::Null),
                });

            if holds {
                Ok(())
            } else {
                Err(RecordStoreError::VersionConflict {
                    id: id.to_string(),
                    collection: collection.to_string(),
                    field: field.clone(),
                })
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .cloned()
            .collect())
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        let store = self.store.read().await;
        let Some(records) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = match &query.filter {
            Some(filter) => RecordEvaluator::filter_records(records.values(), filter)?,
            None => records.values().cloned().collect(),
        };

        if let Some(sort) = &query.sort {
            sort_records(&mut matched, sort);
        }

        Ok(matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        let mut store = self.store.write().await;

        // Rejected writes must not create the collection.
        match store.get(collection) {
            Some(records) => check_condition(records, id, &condition, collection)?,
            None => check_condition(&CollectionMap::new(), id, &condition, collection)?,
        }
        store
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        trace!(collection, id, ?condition, "record stored");

        Ok(())
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        Ok(self
            .store
            .write()
            .await
            .get_mut(collection)
            .and_then(|records| records.remove(id)))
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        match self.store.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(RecordStoreError::CollectionNotFound(name.to_string())),
        }
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        let mut names: Vec<String> = self.store.read().await.keys().cloned().collect();
        names.sort();

        Ok(names)
    }
}

/// Builder for [`InMemoryStore`], optionally pre-creating collections.
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    collections: Vec<String>,
}

impl InMemoryStoreBuilder {
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> RecordStoreResult<Self::Backend> {
        let store: StoreMap = self
            .collections
            .into_iter()
            .map(|name| (name, CollectionMap::new()))
            .collect();

        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(store)),
        })
    }
}
