//! Storage backend abstraction for record adapters.
//!
//! A backend persists whole records keyed by identity inside named collections, and performs
//! the conditional writes that give updates optimistic concurrency. Everything schema related
//! (projection, merging, change notification) happens above this layer in
//! [`RecordAdapter`](crate::adapter::RecordAdapter).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: An object-safe mirror of [`StoreBackend`] for dynamic dispatch
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use recordlayer_core::backend::{StoreBackend, WriteCondition};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend
//!     .put_record("x", doc! { "id": "x", "version": "1" }, WriteCondition::NotExists, "users")
//!     .await?;
//! let stored = backend.get_record("x", "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::{any::Any, fmt::Debug, sync::Arc};

use crate::{error::RecordStoreResult, query::Query, record::Record};

/// Precondition attached to a single-record write.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WriteCondition {
    /// Write unconditionally, replacing any stored record.
    #[default]
    Always,
    /// Write only if no record with the identity exists yet.
    ///
    /// Violations fail with [`RecordStoreError::RecordAlreadyExists`](crate::error::RecordStoreError::RecordAlreadyExists).
    NotExists,
    /// Write only if a stored record exists and its `field` still equals `value`.
    ///
    /// A `Null` value also matches a stored record that lacks the field. Violations fail with
    /// [`RecordStoreError::VersionConflict`](crate::error::RecordStoreError::VersionConflict).
    VersionEquals { field: String, value: Bson },
}

/// Abstract interface for record storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. A conditional [`put_record`](StoreBackend::put_record) must check its
/// condition and write atomically with respect to other writers of the same record.
///
/// # Error Handling
///
/// Operations return [`RecordStoreResult<T>`](crate::error::RecordStoreResult). Backend
/// driver failures are reported as [`RecordStoreError::Backend`](crate::error::RecordStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Fetches a single record by identity.
    ///
    /// # Arguments
    ///
    /// * `id` - The record identity
    /// * `collection` - The name of the collection to read from
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no record with that identity exists.
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>>;

    /// Fetches several records by identity.
    ///
    /// Identities without a stored record are skipped. Result order is backend specific.
    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>>;

    /// Queries records using a structured query.
    ///
    /// Field names in filters and sorts may be dotted paths into nested documents.
    ///
    /// # Arguments
    ///
    /// * `query` - The [`Query`] specifying filters, sorts, limit and offset
    /// * `collection` - The name of the collection to query
    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>>;

    /// Stores a whole record under `id`, subject to `condition`.
    ///
    /// The collection is created on first write if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `id` - The record identity
    /// * `record` - The complete record to store
    /// * `condition` - The precondition the write is subject to
    /// * `collection` - The name of the collection to write to
    ///
    /// # Errors
    ///
    /// - [`RecordStoreError::RecordAlreadyExists`](crate::error::RecordStoreError::RecordAlreadyExists)
    ///   if `condition` is [`WriteCondition::NotExists`] and the record exists
    /// - [`RecordStoreError::VersionConflict`](crate::error::RecordStoreError::VersionConflict)
    ///   if `condition` is [`WriteCondition::VersionEquals`] and it does not hold
    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()>;

    /// Deletes a record by identity and returns what was stored.
    ///
    /// Deleting a record that does not exist returns `Ok(None)`.
    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>>;

    /// Creates an empty collection. Creating an existing collection is a no-op.
    async fn create_collection(&self, name: &str) -> RecordStoreResult<()>;

    /// Drops a collection and every record in it.
    ///
    /// # Errors
    ///
    /// Backends may return [`RecordStoreError::CollectionNotFound`](crate::error::RecordStoreError::CollectionNotFound)
    /// if the collection does not exist.
    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> RecordStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections should override it.
    async fn shutdown(self) -> RecordStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        (*self).get_record(id, collection).await
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        (*self).get_records(ids, collection).await
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        (*self).query_records(query, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        (*self)
            .put_record(id, record, condition, collection)
            .await
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        (*self).delete_record(id, collection).await
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        (*self).list_collections().await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        (**self).get_record(id, collection).await
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        (**self).get_records(ids, collection).await
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        (**self).query_records(query, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        (**self)
            .put_record(id, record, condition, collection)
            .await
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        (**self).delete_record(id, collection).await
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        (**self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        (**self).drop_collection(name).await
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        (**self).list_collections().await
    }
}

/// Object-safe counterpart of [`StoreBackend`], implemented for every sized backend.
///
/// `Box<dyn DynStoreBackend>` implements [`StoreBackend`] again, so a backend chosen at runtime
/// can drive a [`RecordAdapter`](crate::adapter::RecordAdapter) like any concrete one.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>>;
    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>>;
    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>>;
    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()>;
    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>>;
    async fn create_collection(&self, name: &str) -> RecordStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()>;
    async fn list_collections(&self) -> RecordStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> RecordStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        StoreBackend::get_record(self, id, collection).await
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        StoreBackend::get_records(self, ids, collection).await
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        StoreBackend::query_records(self, query, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        StoreBackend::put_record(self, id, record, condition, collection).await
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        StoreBackend::delete_record(self, id, collection).await
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> RecordStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        DynStoreBackend::get_record(&**self, id, collection).await
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        DynStoreBackend::get_records(&**self, ids, collection).await
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        DynStoreBackend::query_records(&**self, query, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        DynStoreBackend::put_record(&**self, id, record, condition, collection).await
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        DynStoreBackend::delete_record(&**self, id, collection).await
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        DynStoreBackend::create_collection(&**self, name).await
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        DynStoreBackend::drop_collection(&**self, name).await
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        DynStoreBackend::list_collections(&**self).await
    }

    async fn shutdown(self) -> RecordStoreResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

/// Factory for backends that need asynchronous setup (connecting, pinging, creating indexes).
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> RecordStoreResult<Self::Backend>;
}
