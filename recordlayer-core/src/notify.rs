//! Change notifications emitted after successful writes.
//!
//! Every create, update and delete performed through a
//! [`RecordAdapter`](crate::adapter::RecordAdapter) produces a [`ChangeEvent`] carrying the
//! written record and a set of routing attributes that subscribers can filter on. Events are
//! handed to a [`ChangeSink`]; the default [`NoopSink`] discards them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt::Debug};
use uuid::Uuid;

use crate::{config::AdapterConfig, error::RecordStoreResult, record::Record};

/// The kind of write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A typed routing attribute.
///
/// Serializes in the message-attribute shape used by pub/sub services:
/// `{"DataType": "String", "StringValue": "users"}`. Numbers keep their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "DataType", content = "StringValue")]
pub enum AttributeValue {
    String(String),
    Number(String),
}

impl AttributeValue {
    /// Converts a configured attribute value.
    ///
    /// Null yields `None` so the attribute is left out. Booleans, arrays and objects are sent as
    /// their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(AttributeValue::String(text.clone())),
            Value::Number(number) => Some(AttributeValue::Number(number.to_string())),
            other => Some(AttributeValue::String(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::String(value) | AttributeValue::Number(value) => value,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

/// Routing attributes for one event.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Builds the routing attributes for an event produced by `operation`.
///
/// With `default_attributes` enabled the set starts from `model_schema`, `model_identifier`,
/// `model_version_key`, `author_identifier` and `operation`; attributes without a configured
/// value are omitted. Custom attributes are layered on top and win on name collisions. With
/// `default_attributes` disabled only the custom attributes are sent.
pub fn routing_attributes(config: &AdapterConfig, operation: Operation) -> Attributes {
    let mut attributes = Attributes::new();

    if config.default_attributes {
        let defaults = [
            ("model_schema", Some(config.model_schema.as_str())),
            ("model_identifier", Some(config.model_identifier.as_str())),
            ("model_version_key", config.model_version_key.as_deref()),
            ("author_identifier", config.author_identifier.as_deref()),
            ("operation", Some(operation.as_str())),
        ];

        for (name, value) in defaults {
            if let Some(value) = value {
                attributes.insert(name.to_string(), AttributeValue::from(value));
            }
        }
    }

    for (name, value) in &config.custom_attributes {
        match AttributeValue::from_json(value) {
            Some(value) => {
                attributes.insert(name.clone(), value);
            }
            None => {
                attributes.remove(name);
            }
        }
    }

    attributes
}

/// A record change, as delivered to a [`ChangeSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub operation: Operation,
    pub collection: String,
    /// The record as written, or as it was before deletion.
    pub record: Record,
    pub attributes: Attributes,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        operation: Operation,
        collection: impl Into<String>,
        record: Record,
        attributes: Attributes,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            collection: collection.into(),
            record,
            attributes,
            occurred_at: Utc::now(),
        }
    }
}

/// Destination for change events.
///
/// Delivery failures are reported to the adapter, which logs them without failing the write
/// that produced the event.
#[async_trait]
pub trait ChangeSink: Send + Sync + Debug {
    async fn publish(&self, event: ChangeEvent) -> RecordStoreResult<()>;
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ChangeSink for NoopSink {
    async fn publish(&self, _event: ChangeEvent) -> RecordStoreResult<()> {
        Ok(())
    }
}
