//! Adapter configuration.
//!
//! An [`AdapterConfig`] names the collection an adapter writes to, the schema its records are
//! projected onto, and how change events are labelled. It is usually read from YAML:
//!
//! ```yaml
//! collection: users
//! model_schema_file: schemas/openapi.yml
//! model_schema: user
//! model_identifier: user_id
//! model_version_key: modified
//! author_identifier: modified_by
//! custom_attributes:
//!   team: growth
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use crate::error::{RecordStoreError, RecordStoreResult};

/// Configuration of one [`RecordAdapter`](crate::adapter::RecordAdapter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Collection (table) the adapter reads and writes.
    pub collection: String,
    /// Path of the schema document.
    pub model_schema_file: PathBuf,
    /// Name of the schema under `components.schemas`.
    pub model_schema: String,
    /// Field holding each record's identity.
    pub model_identifier: String,
    /// Field holding each record's version, used to guard updates against concurrent writers.
    #[serde(default)]
    pub model_version_key: Option<String>,
    /// Field naming the author of a change. Only reported as a routing attribute.
    #[serde(default)]
    pub author_identifier: Option<String>,
    /// Whether change events carry the default routing attributes.
    #[serde(default = "default_true")]
    pub default_attributes: bool,
    /// Extra routing attributes, overriding defaults of the same name.
    #[serde(default)]
    pub custom_attributes: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl AdapterConfig {
    pub fn builder() -> AdapterConfigBuilder {
        AdapterConfigBuilder::default()
    }

    /// Parses and validates a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::InvalidConfig`] if the text does not parse or a required
    /// field is empty.
    pub fn from_yaml_str(text: &str) -> RecordStoreResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| RecordStoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> RecordStoreResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RecordStoreError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;

        Self::from_yaml_str(&text)
    }

    /// Checks that every required field is set.
    pub fn validate(&self) -> RecordStoreResult<()> {
        let required = [
            ("collection", self.collection.is_empty()),
            ("model_schema_file", self.model_schema_file.as_os_str().is_empty()),
            ("model_schema", self.model_schema.is_empty()),
            ("model_identifier", self.model_identifier.is_empty()),
        ];

        match required.iter().find(|(_, missing)| *missing) {
            Some((name, _)) => Err(RecordStoreError::InvalidConfig(format!(
                "{name} must not be empty"
            ))),
            None => Ok(()),
        }
    }
}

/// Builder for [`AdapterConfig`].
#[derive(Debug, Default)]
pub struct AdapterConfigBuilder {
    collection: Option<String>,
    model_schema_file: Option<PathBuf>,
    model_schema: Option<String>,
    model_identifier: Option<String>,
    model_version_key: Option<String>,
    author_identifier: Option<String>,
    default_attributes: Option<bool>,
    custom_attributes: BTreeMap<String, Value>,
}

impl AdapterConfigBuilder {
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn model_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_schema_file = Some(path.into());
        self
    }

    pub fn model_schema(mut self, name: impl Into<String>) -> Self {
        self.model_schema = Some(name.into());
        self
    }

    pub fn model_identifier(mut self, field: impl Into<String>) -> Self {
        self.model_identifier = Some(field.into());
        self
    }

    pub fn model_version_key(mut self, field: impl Into<String>) -> Self {
        self.model_version_key = Some(field.into());
        self
    }

    pub fn author_identifier(mut self, field: impl Into<String>) -> Self {
        self.author_identifier = Some(field.into());
        self
    }

    pub fn default_attributes(mut self, enabled: bool) -> Self {
        self.default_attributes = Some(enabled);
        self
    }

    pub fn custom_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::InvalidConfig`] if a required field was not set.
    pub fn build(self) -> RecordStoreResult<AdapterConfig> {
        let config = AdapterConfig {
            collection: self.collection.unwrap_or_default(),
            model_schema_file: self.model_schema_file.unwrap_or_default(),
            model_schema: self.model_schema.unwrap_or_default(),
            model_identifier: self.model_identifier.unwrap_or_default(),
            model_version_key: self.model_version_key,
            author_identifier: self.author_identifier,
            default_attributes: self.default_attributes.unwrap_or(true),
            custom_attributes: self.custom_attributes,
        };
        config.validate()?;
        Ok(config)
    }
}
