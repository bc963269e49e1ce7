//! Runtime selection of a storage backend.
//!
//! A deployment picks its backend in configuration rather than in code:
//!
//! ```yaml
//! backend:
//!   engine: mongodb
//!   dsn: mongodb://localhost:27017
//!   database: accounts
//! adapter:
//!   collection: users
//!   model_schema_file: schemas/openapi.yml
//!   model_schema: user
//!   model_identifier: user_id
//!   model_version_key: modified
//! ```
//!
//! Only engines compiled into the crate are accepted; `mongodb` needs the `mongodb` feature.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

use recordlayer_core::{
    adapter::{DynRecordAdapter, RecordAdapter},
    backend::DynStoreBackend,
    cache::SchemaCache,
    config::AdapterConfig,
    error::{RecordStoreError, RecordStoreResult},
};
use recordlayer_memory::InMemoryStore;

/// The storage engines this build supports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum Engine {
    /// A fresh, empty in-memory store.
    #[default]
    Memory,
    #[cfg(feature = "mongodb")]
    Mongodb { dsn: String, database: String },
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Memory => "memory",
            #[cfg(feature = "mongodb")]
            Engine::Mongodb { .. } => "mongodb",
        }
    }

    /// Creates the backend this engine describes.
    ///
    /// # Errors
    ///
    /// [`RecordStoreError::Initialization`] if the backend cannot be set up.
    pub async fn connect(&self) -> RecordStoreResult<Box<dyn DynStoreBackend>> {
        info!(engine = self.name(), "connecting record store backend");

        match self {
            Engine::Memory => Ok(Box::new(InMemoryStore::new())),
            #[cfg(feature = "mongodb")]
            Engine::Mongodb { dsn, database } => {
                use recordlayer_core::backend::StoreBackendBuilder;

                let store = recordlayer_mongodb::MongoDbStore::builder(dsn, database)
                    .build()
                    .await?;
                Ok(Box::new(store))
            }
        }
    }
}

/// A backend choice together with the adapter to run on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLayerConfig {
    #[serde(default)]
    pub backend: Engine,
    pub adapter: AdapterConfig,
}

impl RecordLayerConfig {
    /// # Errors
    ///
    /// [`RecordStoreError::InvalidConfig`] if the text does not parse, names an engine that is
    /// not compiled in, or the adapter section is incomplete.
    pub fn from_yaml_str(text: &str) -> RecordStoreResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| RecordStoreError::InvalidConfig(e.to_string()))?;
        config.adapter.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> RecordStoreResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RecordStoreError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;

        Self::from_yaml_str(&text)
    }

    /// Connects the backend and builds the adapter, loading its schema through `cache`.
    pub async fn build(self, cache: &SchemaCache) -> RecordStoreResult<DynRecordAdapter> {
        let backend = self.backend.connect().await?;

        RecordAdapter::connect(backend, self.adapter, cache).await
    }
}
