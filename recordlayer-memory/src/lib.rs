//! In-memory storage backend for recordlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait and a
//! `ChangeSink` that keeps every published event. Both are meant for development and tests, and
//! for small deployments where persistence is not needed.
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{adapter::RecordAdapter, cache::SchemaCache, config::AdapterConfig};
//! use recordlayer::memory::{InMemoryStore, MemoryChangeSink};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AdapterConfig::from_yaml_file("adapters/users.yml")?;
//!     let events = MemoryChangeSink::new();
//!     let users = RecordAdapter::connect(InMemoryStore::new(), config, &SchemaCache::new())
//!         .await?
//!         .with_sink(events.clone());
//!
//!     users.create(&doc! { "user_id": "u1" }).await?;
//!     assert_eq!(events.events().await.len(), 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_memory;

pub mod evaluator;
pub mod sink;
pub mod store;

pub use sink::MemoryChangeSink;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
