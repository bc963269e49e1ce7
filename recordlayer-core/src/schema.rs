//! Loading structural record schemas from OpenAPI-style documents.
//!
//! A schema document is YAML or JSON with a `components.schemas` map keyed by type name:
//!
//! ```yaml
//! components:
//!   schemas:
//!     audit-fields:
//!       type: object
//!       properties:
//!         created: { type: string, format: date-time }
//!     user:
//!       allOf:
//!         - $ref: '#/components/schemas/audit-fields'
//!         - type: object
//!           properties:
//!             id: { type: string }
//! ```
//!
//! [`SchemaDocument::schema`] extracts one entry and expands every in-document `$ref` before the
//! result is turned into a [`Schema`], so nothing downstream ever sees a reference.

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};
use serde_json::{Map, Value};
use std::{fmt, fs, path::Path};
use tracing::debug;

use crate::{
    error::{RecordStoreError, RecordStoreResult},
    project,
    record::Record,
};

/// The declared type of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

/// Structural description of one record type.
///
/// Only the parts that shape a record are modelled; validation keywords such as `required` or
/// `enum` are accepted in the document and ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Schema {
    /// Declared type. OpenAPI 3.1 type lists such as `[string, "null"]` keep their first non-null entry.
    #[serde(rename = "type", default, deserialize_with = "deserialize_type")]
    pub kind: Option<SchemaType>,
    /// Object properties in declaration order.
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<(String, Schema)>,
    /// Element schema of an array.
    #[serde(default)]
    pub items: Option<Box<Schema>>,
    /// Partial schemas this one is composed of.
    #[serde(rename = "allOf", default)]
    pub all_of: Vec<Schema>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Schema {
    /// Whether this node describes an object.
    ///
    /// A node without a `type` counts as an object when it declares properties.
    pub fn is_object(&self) -> bool {
        match self.kind {
            Some(SchemaType::Object) => true,
            None => !self.properties.is_empty(),
            _ => false,
        }
    }

    /// Whether this node describes an array.
    pub fn is_array(&self) -> bool {
        self.kind == Some(SchemaType::Array)
    }

    /// The flattened, ordered property set of this schema.
    ///
    /// With `allOf`, the properties of every object-typed component are concatenated in
    /// declaration order. When two components declare the same name the later declaration wins,
    /// while the property keeps the position where it was first declared. Without `allOf` the
    /// schema's own properties are returned, provided it is object-typed.
    pub fn declared_properties(&self) -> Vec<(&str, &Schema)> {
        let mut declared = Vec::new();
        self.collect_properties(&mut declared);
        declared
    }

    fn collect_properties<'a>(&'a self, declared: &mut Vec<(&'a str, &'a Schema)>) {
        if !self.all_of.is_empty() {
            for component in &self.all_of {
                component.collect_properties(declared);
            }
            return;
        }

        if !self.is_object() {
            return;
        }

        for (name, schema) in &self.properties {
            match declared
                .iter_mut()
                .find(|(existing, _)| *existing == name.as_str())
            {
                Some(entry) => entry.1 = schema,
                None => declared.push((name.as_str(), schema)),
            }
        }
    }

    /// Projects `input` onto this schema. See [`project::project`].
    pub fn project(&self, input: &Record) -> Record {
        project::project(input, self)
    }
}

fn deserialize_type<'de, D>(deserializer: D) -> Result<Option<SchemaType>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TypeDecl {
        One(SchemaType),
        Many(Vec<SchemaType>),
    }

    Ok(match Option::<TypeDecl>::deserialize(deserializer)? {
        Some(TypeDecl::One(kind)) => Some(kind),
        Some(TypeDecl::Many(kinds)) => kinds
            .into_iter()
            .find(|kind| *kind != SchemaType::Null),
        None => None,
    })
}

fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<(String, Schema)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PropertiesVisitor;

    impl<'de> Visitor<'de> for PropertiesVisitor {
        type Value = Vec<(String, Schema)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of property names to schemas")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut properties = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, schema)) = map.next_entry::<String, Schema>()? {
                properties.push((name, schema));
            }
            Ok(properties)
        }
    }

    deserializer.deserialize_map(PropertiesVisitor)
}

/// A parsed schema document.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    source: String,
    root: Value,
}

impl SchemaDocument {
    /// Reads and parses a schema document from disk.
    ///
    /// # Errors
    ///
    /// [`RecordStoreError::DocumentRead`] if the file cannot be read,
    /// [`RecordStoreError::DocumentParse`] if it is not valid YAML/JSON.
    pub fn from_path(path: impl AsRef<Path>) -> RecordStoreResult<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let text = fs::read_to_string(path)
            .map_err(|e| RecordStoreError::DocumentRead(source.clone(), e.to_string()))?;

        Self::from_str_named(source, &text)
    }

    /// Parses a schema document from YAML (or JSON, which YAML accepts) text.
    pub fn from_yaml_str(text: &str) -> RecordStoreResult<Self> {
        Self::from_str_named("<inline>".to_string(), text)
    }

    fn from_str_named(source: String, text: &str) -> RecordStoreResult<Self> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| RecordStoreError::DocumentParse(format!("{source}: {e}")))?;

        if !root.is_object() {
            return Err(RecordStoreError::DocumentParse(format!(
                "{source}: top level must be a mapping"
            )));
        }

        Ok(Self { source, root })
    }

    /// Where this document was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all entries under `components.schemas`.
    pub fn schema_names(&self) -> Vec<&str> {
        self.schemas()
            .map(|schemas| schemas.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn schemas(&self) -> Option<&Map<String, Value>> {
        self.root
            .pointer("/components/schemas")
            .and_then(Value::as_object)
    }

    /// Extracts `components.schemas[type_name]` with all references expanded.
    ///
    /// # Errors
    ///
    /// - [`RecordStoreError::SchemaNotFound`] if the entry does not exist
    /// - [`RecordStoreError::ReferenceResolution`] if a `$ref` is dangling, external, or cyclic
    /// - [`RecordStoreError::DocumentParse`] if the entry is not shaped like a schema
    pub fn schema(&self, type_name: &str) -> RecordStoreResult<Schema> {
        let raw = self
            .schemas()
            .and_then(|schemas| schemas.get(type_name))
            .ok_or_else(|| {
                RecordStoreError::SchemaNotFound(type_name.to_string(), self.source.clone())
            })?;

        let resolved = self.resolve(raw, &mut Vec::new())?;

        serde_json::from_value(resolved).map_err(|e| {
            RecordStoreError::DocumentParse(format!("{}: schema {type_name}: {e}", self.source))
        })
    }

    fn resolve(&self, value: &Value, expanding: &mut Vec<String>) -> RecordStoreResult<Value> {
        match value {
            Value::Object(map) => {
                // A reference object is replaced wholesale by its target; siblings are ignored.
                if let Some(Value::String(reference)) = map.get("$ref") {
                    if expanding.contains(reference) {
                        return Err(RecordStoreError::ReferenceResolution(
                            reference.clone(),
                            "reference cycle".to_string(),
                        ));
                    }

                    let target = self.lookup(reference)?;
                    expanding.push(reference.clone());
                    let resolved = self.resolve(target, expanding)?;
                    expanding.pop();

                    return Ok(resolved);
                }

                map.iter()
                    .map(|(key, nested)| Ok((key.clone(), self.resolve(nested, expanding)?)))
                    .collect::<RecordStoreResult<Map<String, Value>>>()
                    .map(Value::Object)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, expanding))
                .collect::<RecordStoreResult<Vec<Value>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn lookup(&self, reference: &str) -> RecordStoreResult<&Value> {
        let pointer = reference.strip_prefix('#').ok_or_else(|| {
            RecordStoreError::ReferenceResolution(
                reference.to_string(),
                "only references within the same document are supported".to_string(),
            )
        })?;

        self.root.pointer(pointer).ok_or_else(|| {
            RecordStoreError::ReferenceResolution(
                reference.to_string(),
                format!("no such target in {}", self.source),
            )
        })
    }
}

/// Loads the schema named `type_name` from the document at `document_path`.
///
/// This reads the document synchronously on every call; use [`crate::cache::SchemaCache`] to
/// share loaded schemas between adapters.
pub fn load(document_path: impl AsRef<Path>, type_name: &str) -> RecordStoreResult<Schema> {
    let document = SchemaDocument::from_path(document_path)?;
    let schema = document.schema(type_name)?;

    debug!(
        document = document.source(),
        schema = type_name,
        properties = schema.declared_properties().len(),
        "loaded record schema"
    );

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOCUMENT: &str = r##"
openapi: 3.0.0
components:
  schemas:
    audit:
      type: object
      properties:
        created: { type: string, format: date-time }
        modified: { type: string, format: date-time }
    address:
      type: object
      properties:
        city: { type: string }
        zip: { type: string }
    person:
      allOf:
        - $ref: '#/components/schemas/audit'
        - type: object
          properties:
            id: { type: string }
            home:
              $ref: '#/components/schemas/address'
            nicknames:
              type: array
              items: { type: string }
            modified: { type: integer }
    dangling:
      type: object
      properties:
        other:
          $ref: '#/components/schemas/nowhere'
    loop-a:
      type: object
      properties:
        b: { $ref: '#/components/schemas/loop-b' }
    loop-b:
      type: object
      properties:
        a: { $ref: '#/components/schemas/loop-a' }
    remote:
      $ref: 'other.yml#/components/schemas/thing'
"##;

    fn names(schema: &Schema) -> Vec<&str> {
        schema
            .declared_properties()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    #[test]
    fn resolves_references_and_flattens_all_of() {
        let document = SchemaDocument::from_yaml_str(DOCUMENT).unwrap();
        let person = document.schema("person").unwrap();

        assert_eq!(names(&person), vec!["created", "modified", "id", "home", "nicknames"]);

        let home = person
            .declared_properties()
            .into_iter()
            .find(|(name, _)| *name == "home")
            .map(|(_, schema)| schema)
            .unwrap();
        assert!(home.is_object());
        assert_eq!(names(home), vec!["city", "zip"]);
    }

    #[test]
    fn later_all_of_components_win_name_collisions() {
        let document = SchemaDocument::from_yaml_str(DOCUMENT).unwrap();
        let person = document.schema("person").unwrap();
        let modified = person
            .declared_properties()
            .into_iter()
            .find(|(name, _)| *name == "modified")
            .map(|(_, schema)| schema)
            .unwrap();

        assert_eq!(modified.kind, Some(SchemaType::Integer));
    }

    #[test]
    fn missing_type_name_is_schema_not_found() {
        let document = SchemaDocument::from_yaml_str(DOCUMENT).unwrap();

        assert!(matches!(
            document.schema("ghost"),
            Err(RecordStoreError::SchemaNotFound(name, _)) if name == "ghost"
        ));
    }

    #[test]
    fn dangling_reference_fails() {
        let document = SchemaDocument::from_yaml_str(DOCUMENT).unwrap();

        assert!(matches!(
            document.schema("dangling"),
            Err(RecordStoreError::ReferenceResolution(reference, _))
                if reference == "#/components/schemas/nowhere"
        ));
    }

    #[test]
    fn cyclic_and_external_references_fail() {
        let document = SchemaDocument::from_yaml_str(DOCUMENT).unwrap();

        assert!(matches!(
            document.schema("loop-a"),
            Err(RecordStoreError::ReferenceResolution(_, reason)) if reason == "reference cycle"
        ));
        assert!(matches!(
            document.schema("remote"),
            Err(RecordStoreError::ReferenceResolution(_, _))
        ));
    }

    #[test]
    fn unparseable_document_is_a_parse_error() {
        assert!(matches!(
            SchemaDocument::from_yaml_str("components: [unclosed"),
            Err(RecordStoreError::DocumentParse(_))
        ));
        assert!(matches!(
            SchemaDocument::from_yaml_str("- just\n- a list\n"),
            Err(RecordStoreError::DocumentParse(_))
        ));
    }

    #[test]
    fn json_documents_are_accepted() {
        let document = SchemaDocument::from_yaml_str(
            r#"{"components": {"schemas": {"tag": {"type": "object", "properties": {"label": {"type": ["string", "null"]}}}}}}"#,
        )
        .unwrap();
        let tag = document.schema("tag").unwrap();

        assert_eq!(document.schema_names(), vec!["tag"]);
        assert_eq!(tag.declared_properties()[0].1.kind, Some(SchemaType::String));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();

        let schema = load(file.path(), "address").unwrap();
        assert_eq!(names(&schema), vec!["city", "zip"]);

        assert!(matches!(
            load(file.path().with_extension("missing"), "address"),
            Err(RecordStoreError::DocumentRead(_, _))
        ));
    }
}
