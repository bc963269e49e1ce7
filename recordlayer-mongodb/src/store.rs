use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, trace};

use recordlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder, WriteCondition},
    error::{RecordStoreError, RecordStoreResult},
    query::{Query, QueryVisitor, SortDirection},
    record::Record,
};

use crate::{query::MongoQueryTranslator, sanitizer::KeySanitizer};

const DUPLICATE_KEY: i32 = 11000;

fn backend_error(e: MongoError) -> RecordStoreError {
    RecordStoreError::Backend(e.to_string())
}

fn is_duplicate_key(e: &MongoError) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY
    )
}

/// Record storage on MongoDB.
///
/// Each record is one document whose `_id` is the record identity. Keys are escaped with the
/// crate's key sanitizer; the `_id` field is stripped again when records are read back.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&KeySanitizer::sanitize_key(collection_name))
    }

    fn prepare_record(id: &str, record: &Record) -> Document {
        let mut stored = KeySanitizer::sanitize_document(record);
        stored.insert("_id", id);
        stored
    }

    fn restore_record(mut stored: Document) -> Record {
        stored.remove("_id");
        KeySanitizer::restore_document(&stored)
    }

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        Ok(self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)?
            .into_iter()
            .map(Self::restore_record)
            .collect())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn get_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        Ok(self
            .get_collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend_error)?
            .map(Self::restore_record))
    }

    async fn get_records(
        &self,
        ids: Vec<String>,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        self.find(
            doc! { "_id": { "$in": ids } },
            FindOptions::default(),
            collection,
        )
        .await
    }

    async fn query_records(
        &self,
        query: Query,
        collection: &str,
    ) -> RecordStoreResult<Vec<Record>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            let field = KeySanitizer::sanitize_path(&sort.field);
            let direction = match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            options.sort = Some(doc! { field: direction });
        }

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };
        trace!(collection, filter = %filter, "querying records");

        self.find(filter, options, collection).await
    }

    async fn put_record(
        &self,
        id: &str,
        record: Record,
        condition: WriteCondition,
        collection: &str,
    ) -> RecordStoreResult<()> {
        let stored = Self::prepare_record(id, &record);
        let target = self.get_collection(collection);

        match condition {
            WriteCondition::Always => {
                target
                    .replace_one(doc! { "_id": id }, stored)
                    .upsert(true)
                    .await
                    .map_err(backend_error)?;
            }
            WriteCondition::NotExists => {
                target.insert_one(stored).await.map_err(|e| {
                    if is_duplicate_key(&e) {
                        RecordStoreError::RecordAlreadyExists(id.to_string(), collection.to_string())
                    } else {
                        backend_error(e)
                    }
                })?;
            }
            WriteCondition::VersionEquals { field, value } => {
                // A null filter value also matches documents lacking the field.
                let path = KeySanitizer::sanitize_path(&field);
                let result = target
                    .replace_one(doc! { "_id": id, path: value }, stored)
                    .await
                    .map_err(backend_error)?;

                if result.matched_count == 0 {
                    return Err(RecordStoreError::VersionConflict {
                        id: id.to_string(),
                        collection: collection.to_string(),
                        field,
                    });
                }
            }
        }

        Ok(())
    }

    async fn delete_record(&self, id: &str, collection: &str) -> RecordStoreResult<Option<Record>> {
        Ok(self
            .get_collection(collection)
            .find_one_and_delete(doc! { "_id": id })
            .await
            .map_err(backend_error)?
            .map(Self::restore_record))
    }

    async fn create_collection(&self, name: &str) -> RecordStoreResult<()> {
        let name = KeySanitizer::sanitize_key(name);
        let database = self.client.database(&self.database);

        let existing = database
            .list_collection_names()
            .await
            .map_err(backend_error)?;
        if existing.contains(&name) {
            return Ok(());
        }

        database
            .create_collection(&name)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> RecordStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> RecordStoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)?
            .iter()
            .map(|name| KeySanitizer::restore_key(name))
            .collect();
        names.sort();

        Ok(names)
    }

    async fn shutdown(self) -> RecordStoreResult<()> {
        self.client.shutdown().await;
        debug!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> RecordStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| RecordStoreError::Initialization(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| RecordStoreError::Initialization(e.to_string()))?;

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_documents_round_trip_without_the_id() {
        let record = doc! { "id": "u1", "a.b": { "$c": 1 } };
        let stored = MongoDbStore::prepare_record("u1", &record);

        assert_eq!(stored.get_str("_id").unwrap(), "u1");
        assert!(stored.contains_key("a__dot__b"));
        assert_eq!(MongoDbStore::restore_record(stored), record);
    }
}
