//! Shared cache of loaded schemas.
//!
//! Loading a schema means reading, parsing and resolving a whole document, so adapters built
//! for the same `(document, type)` pair should share one [`Schema`]. A [`SchemaCache`] is an
//! explicit value: clone it to share it, drop it (or [`clear`](SchemaCache::clear) it) to forget
//! everything.

use mea::rwlock::RwLock;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::trace;

use crate::{
    error::RecordStoreResult,
    schema::{self, Schema},
};

type CacheKey = (PathBuf, String);

/// Registry of loaded schemas keyed by document path and type name.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<Schema>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema, loading it with [`schema::load`] on first use.
    ///
    /// Failed loads are not cached, so a corrected document is picked up by the next call.
    /// When two tasks load the same schema concurrently the first insertion wins.
    ///
    /// A miss reads the document with blocking file I/O on the calling task; no lock is held
    /// while it runs. The crate does not depend on an executor, so callers that cannot afford
    /// the stall should warm the cache at startup or resolve misses on their runtime's blocking
    /// pool.
    ///
    /// # Errors
    ///
    /// Any error of [`schema::load`].
    pub async fn get_or_load(
        &self,
        document_path: impl AsRef<Path>,
        type_name: &str,
    ) -> RecordStoreResult<Arc<Schema>> {
        let key = (document_path.as_ref().to_path_buf(), type_name.to_string());

        if let Some(schema) = self.entries.read().await.get(&key) {
            trace!(document = %key.0.display(), schema = type_name, "schema cache hit");
            return Ok(schema.clone());
        }

        let loaded = Arc::new(schema::load(&key.0, type_name)?);

        Ok(self
            .entries
            .write()
            .await
            .entry(key)
            .or_insert(loaded)
            .clone())
    }

    /// Forgets one schema so the next lookup reloads it. Returns whether it was cached.
    pub async fn invalidate(&self, document_path: impl AsRef<Path>, type_name: &str) -> bool {
        let key = (document_path.as_ref().to_path_buf(), type_name.to_string());

        self.entries.write().await.remove(&key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
