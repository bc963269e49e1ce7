//! Main recordlayer crate providing schema-driven record storage.
//!
//! This crate is the primary entry point of the recordlayer project. It re-exports the core
//! types from the sub-crates, bundles the in-memory backend, and selects a backend at runtime
//! from configuration (see [`engine`]).
//!
//! Writes through a [`RecordAdapter`](adapter::RecordAdapter) always store exactly the fields a
//! schema declares: input is projected onto the schema on create, and updates merge a patch
//! into the stored record before projecting it again.
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::{InMemoryStore, MemoryChangeSink}};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> RecordStoreResult<()> {
//!     let config = AdapterConfig::builder()
//!         .collection("users")
//!         .model_schema_file("schemas/openapi.yml")
//!         .model_schema("user")
//!         .model_identifier("user_id")
//!         .model_version_key("modified")
//!         .build()?;
//!     let events = MemoryChangeSink::new();
//!
//!     let users = RecordAdapter::connect(InMemoryStore::new(), config, &SchemaCache::new())
//!         .await?
//!         .with_sink(events.clone());
//!
//!     users
//!         .create(&doc! { "user_id": "u1", "modified": "1", "not_in_schema": true })
//!         .await?;
//!     let updated = users
//!         .update(
//!             "u1",
//!             &doc! { "tags": ["admin"] },
//!             MergePolicy::default().with_list_policy(ListPolicy::Add),
//!         )
//!         .await?;
//!
//!     println!("{updated}");
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! [`RecordLayerConfig`](engine::RecordLayerConfig) reads a backend choice and an adapter from
//! YAML and builds a [`DynRecordAdapter`](adapter::DynRecordAdapter), which runs on a
//! `Box<dyn DynStoreBackend>`.
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod engine;
pub mod prelude;

pub use recordlayer_core::{
    adapter, backend, cache, config, error, merge, notify, page, project, query, record, schema,
};

pub use engine::{Engine, RecordLayerConfig};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend and change sink.
pub mod memory {
    pub use recordlayer_memory::{InMemoryStore, InMemoryStoreBuilder, MemoryChangeSink};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use recordlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
