//! Schema-aware CRUD over a storage backend.
//!
//! A [`RecordAdapter`] binds one collection of a [`StoreBackend`] to one [`Schema`]. Every record
//! it writes is first projected onto the schema, updates merge a patch into the stored record
//! before projecting, and every successful write is announced to a [`ChangeSink`].
//!
//! # Example
//!
//! ```ignore
//! use recordlayer_core::{adapter::RecordAdapter, cache::SchemaCache, config::AdapterConfig};
//! use recordlayer_core::merge::MergePolicy;
//! use bson::doc;
//!
//! let config = AdapterConfig::from_yaml_file("adapters/users.yml")?;
//! let users = RecordAdapter::connect(backend, config, &SchemaCache::new()).await?;
//!
//! users.create(&doc! { "user_id": "u1", "modified": "1", "junk": true }).await?;
//! let updated = users
//!     .update("u1", &doc! { "profile": { "age": 30 } }, MergePolicy::default())
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use bson::Bson;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::{
    backend::{DynStoreBackend, StoreBackend, WriteCondition},
    cache::SchemaCache,
    config::AdapterConfig,
    error::{RecordStoreError, RecordStoreResult},
    merge::{MergePolicy, merge},
    notify::{ChangeEvent, ChangeSink, NoopSink, Operation, routing_attributes},
    page::{Page, PaginationParams},
    project::project,
    query::Query,
    record::{Record, get_path, record_identity},
    schema::Schema,
};

/// How [`RecordAdapter::create_with`] treats an existing record with the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Fail with [`RecordStoreError::RecordAlreadyExists`].
    #[default]
    Insert,
    /// Replace it.
    Overwrite,
}

/// Schema-aware access to one collection.
///
/// Cloning is cheap when the backend is; the schema and the sink are shared.
#[derive(Debug, Clone)]
pub struct RecordAdapter<B> {
    backend: B,
    config: AdapterConfig,
    schema: Arc<Schema>,
    sink: Arc<dyn ChangeSink>,
}

/// An adapter over a backend chosen at runtime.
pub type DynRecordAdapter = RecordAdapter<Box<dyn DynStoreBackend>>;

impl<B: StoreBackend> RecordAdapter<B> {
    /// Creates an adapter from an already loaded schema. Events go to a [`NoopSink`].
    pub fn new(backend: B, config: AdapterConfig, schema: Arc<Schema>) -> Self {
        Self {
            backend,
            config,
            schema,
            sink: Arc::new(NoopSink),
        }
    }

    /// Validates `config` and creates an adapter, loading its schema through `cache`.
    ///
    /// # Errors
    ///
    /// [`RecordStoreError::InvalidConfig`] for an incomplete configuration, or any schema
    /// loading error.
    pub async fn connect(
        backend: B,
        config: AdapterConfig,
        cache: &SchemaCache,
    ) -> RecordStoreResult<Self> {
        config.validate()?;
        let schema = cache
            .get_or_load(&config.model_schema_file, &config.model_schema)
            .await?;

        Ok(Self::new(backend, config, schema))
    }

    /// Sends change events to `sink` instead.
    pub fn with_sink(self, sink: impl ChangeSink + 'static) -> Self {
        self.with_shared_sink(Arc::new(sink))
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Projects `data` onto this adapter's schema without touching the backend.
    pub fn project(&self, data: &Record) -> Record {
        project(data, &self.schema)
    }

    /// Reads the identity of `record` from the configured identifier field.
    pub fn identity_of(&self, record: &Record) -> RecordStoreResult<String> {
        record_identity(record, &self.config.model_identifier)
    }

    /// Projects and stores a new record, failing if its identity is taken.
    ///
    /// # Errors
    ///
    /// [`RecordStoreError::InvalidRecord`] if the projected record has no identity,
    /// [`RecordStoreError::RecordAlreadyExists`] if a record with that identity exists.
    pub async fn create(&self, data: &Record) -> RecordStoreResult<Record> {
        self.create_with(data, CreateMode::Insert).await
    }

    /// Projects and stores a record, replacing any record with the same identity.
    pub async fn overwrite(&self, data: &Record) -> RecordStoreResult<Record> {
        self.create_with(data, CreateMode::Overwrite).await
    }

    /// Projects and stores a record under the given [`CreateMode`], then publishes a `create`
    /// event. Returns the record as stored.
    #[instrument(skip_all, fields(collection = %self.config.collection, mode = ?mode))]
    pub async fn create_with(&self, data: &Record, mode: CreateMode) -> RecordStoreResult<Record> {
        let record = self.project(data);
        let id = self.identity_of(&record)?;
        let condition = match mode {
            CreateMode::Insert => WriteCondition::NotExists,
            CreateMode::Overwrite => WriteCondition::Always,
        };

        self.backend
            .put_record(&id, record.clone(), condition, &self.config.collection)
            .await?;
        debug!(id = %id, "record created");

        self.publish(Operation::Create, &record).await;
        Ok(record)
    }

    pub async fn read(&self, id: &str) -> RecordStoreResult<Option<Record>> {
        self.backend
            .get_record(id, &self.config.collection)
            .await
    }

    pub async fn read_many<I, S>(&self, ids: I) -> RecordStoreResult<Vec<Record>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backend
            .get_records(ids.into_iter().map(Into::into).collect(), &self.config.collection)
            .await
    }

    pub async fn query(&self, query: Query) -> RecordStoreResult<Vec<Record>> {
        self.backend
            .query_records(query, &self.config.collection)
            .await
    }

    /// Runs `query` and returns one page of its results.
    ///
    /// The query's own `limit` and `offset` are ignored; `params` decides the window.
    pub async fn query_page(
        &self,
        mut query: Query,
        params: PaginationParams,
    ) -> RecordStoreResult<Page<Record>> {
        query.limit = None;
        query.offset = None;

        Ok(params.paginate(self.query(query).await?))
    }

    /// Merges `patch` into the stored record `id`, projects the result and stores it.
    ///
    /// When a version key is configured the write only succeeds if the stored version still
    /// equals the one that was read. Publishes an `update` event and returns the stored record.
    ///
    /// # Errors
    ///
    /// - [`RecordStoreError::MergeTargetMissing`] if there is no record `id`; nothing is written
    /// - [`RecordStoreError::VersionConflict`] if the record changed since it was read
    /// - [`RecordStoreError::InvalidRecord`] if the patch changes or clears the identifier field
    #[instrument(skip_all, fields(collection = %self.config.collection, id = %id))]
    pub async fn update(
        &self,
        id: &str,
        patch: &Record,
        policy: MergePolicy,
    ) -> RecordStoreResult<Record> {
        let original = self
            .backend
            .get_record(id, &self.config.collection)
            .await?
            .ok_or_else(|| {
                RecordStoreError::MergeTargetMissing(id.to_string(), self.config.collection.clone())
            })?;

        self.apply_update(id, &original, patch, policy).await
    }

    /// Updates the record identified by `data` if it exists, creates it otherwise.
    #[instrument(skip_all, fields(collection = %self.config.collection))]
    pub async fn upsert(&self, data: &Record, policy: MergePolicy) -> RecordStoreResult<Record> {
        let id = self.identity_of(data)?;

        match self
            .backend
            .get_record(&id, &self.config.collection)
            .await?
        {
            Some(original) => self.apply_update(&id, &original, data, policy).await,
            None => self.create_with(data, CreateMode::Insert).await,
        }
    }

    /// Deletes record `id`, publishing a `delete` event with the removed record if there was one.
    #[instrument(skip_all, fields(collection = %self.config.collection, id = %id))]
    pub async fn delete(&self, id: &str) -> RecordStoreResult<Option<Record>> {
        let removed = self
            .backend
            .delete_record(id, &self.config.collection)
            .await?;

        if let Some(record) = &removed {
            self.publish(Operation::Delete, record).await;
        }

        Ok(removed)
    }

    async fn apply_update(
        &self,
        id: &str,
        original: &Record,
        patch: &Record,
        policy: MergePolicy,
    ) -> RecordStoreResult<Record> {
        let merged = merge(original, patch, policy);
        let record = self.project(&merged);

        let identity = self.identity_of(&record)?;
        if identity != id {
            return Err(RecordStoreError::InvalidRecord(format!(
                "update of {id} would change {} to {identity}",
                self.config.model_identifier
            )));
        }

        let condition = match &self.config.model_version_key {
            Some(field) => WriteCondition::VersionEquals {
                field: field.clone(),
                value: get_path(original, field).cloned().unwrap_or(Bson::Null),
            },
            None => WriteCondition::Always,
        };

        self.backend
            .put_record(id, record.clone(), condition, &self.config.collection)
            .await?;
        debug!(
            list_policy = %policy.list_policy,
            dict_policy = %policy.dict_policy,
            "record updated"
        );

        self.publish(Operation::Update, &record).await;
        Ok(record)
    }

    async fn publish(&self, operation: Operation, record: &Record) {
        if record.is_empty() {
            debug!(operation = operation.as_str(), "empty record, no change event");
            return;
        }

        let event = ChangeEvent::new(
            operation,
            self.config.collection.as_str(),
            record.clone(),
            routing_attributes(&self.config, operation),
        );
        let event_id = event.id;

        if let Err(e) = self.sink.publish(event).await {
            warn!(
                event_id = %event_id,
                operation = operation.as_str(),
                error = %e,
                "failed to publish change event"
            );
        }
    }

    /// Consumes the adapter and shuts its backend down.
    pub async fn shutdown(self) -> RecordStoreResult<()> {
        self.backend.shutdown().await
    }
}
