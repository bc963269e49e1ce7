//! Error types and result types for record store operations.
//!
//! This module provides error handling for schema loading, record adapters and storage backends.
//! Use [`RecordStoreResult<T>`] as the return type for fallible operations.
//!
//! Projection and merging are total and never produce an error; everything here comes from
//! loading schema documents, talking to a backend, or the update orchestration around them.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a record store.
#[derive(Error, Debug)]
pub enum RecordStoreError {
    /// The schema document does not declare `components.schemas[<type>]`.
    /// The first argument is the type name, the second is the document locator.
    #[error("Schema {0} not found in document {1}")]
    SchemaNotFound(String, String),
    /// The schema document could not be read from its source.
    #[error("Unable to read schema document {0}: {1}")]
    DocumentRead(String, String),
    /// The schema document is not valid YAML/JSON or is not shaped like a schema document.
    #[error("Unable to parse schema document: {0}")]
    DocumentParse(String),
    /// A `$ref` inside the schema document points at nothing, outside the document, or at itself.
    #[error("Unable to resolve reference {0}: {1}")]
    ReferenceResolution(String, String),
    /// An update found no original record to merge against.
    /// The first argument is the record identity, the second is the collection name.
    #[error("No record {0} in collection {1} to update")]
    MergeTargetMissing(String, String),
    /// A record with the given identity already exists in the collection.
    #[error("Record {0} already exists in collection {1}")]
    RecordAlreadyExists(String, String),
    /// The requested record was not found in the collection.
    #[error("Record {0} not found in collection {1}")]
    RecordNotFound(String, String),
    /// A conditional write was rejected because the stored version changed since it was read.
    #[error("Record {id} in collection {collection} was modified concurrently ({field} no longer matches)")]
    VersionConflict {
        /// Identity of the record that was being written.
        id: String,
        /// Collection the record lives in.
        collection: String,
        /// The version field the write was conditioned on.
        field: String,
    },
    /// The record is missing its identity or is otherwise unusable.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// A merge policy name was not recognised.
    #[error("Invalid merge policy: {0}")]
    InvalidPolicy(String),
    /// Adapter or engine configuration is incomplete or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// Serialization/deserialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A change notification could not be delivered.
    #[error("Notification error: {0}")]
    Notification(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A specialized `Result` type for record store operations.
pub type RecordStoreResult<T> = Result<T, RecordStoreError>;

impl From<BsonError> for RecordStoreError {
    fn from(err: BsonError) -> Self {
        RecordStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for RecordStoreError {
    fn from(err: SerdeJsonError) -> Self {
        RecordStoreError::Serialization(err.to_string())
    }
}
