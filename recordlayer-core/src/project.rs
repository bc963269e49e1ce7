//! Projection of arbitrary records onto a [`Schema`].
//!
//! The projected record carries exactly the schema's declared fields, in declaration order.
//! Declared fields missing from the input are filled with a default (null for leaves, an empty
//! list for arrays of objects, a recursively defaulted record for nested objects) and undeclared
//! input fields are dropped. Projection never fails.

use bson::Bson;

use crate::{record::Record, schema::Schema};

/// How a declared property is filled in the projected record.
enum Shape<'a> {
    /// A nested object, projected recursively.
    Object(&'a Schema),
    /// An array whose items are objects, each projected recursively.
    ObjectList(&'a Schema),
    /// Anything else, copied verbatim.
    Leaf,
}

impl<'a> Shape<'a> {
    fn of(schema: &'a Schema) -> Self {
        if has_fields(schema) {
            return Shape::Object(schema);
        }

        match schema.items.as_deref() {
            Some(items) if has_fields(items) => Shape::ObjectList(items),
            _ => Shape::Leaf,
        }
    }
}

fn has_fields(schema: &Schema) -> bool {
    !schema.declared_properties().is_empty()
}

/// Projects `input` onto `schema`.
///
/// The result holds one entry per property in [`Schema::declared_properties`]:
///
/// - nested objects recurse into `input[property]`, or into an empty record when that value is
///   absent or not a document
/// - arrays of objects project each element in order, and become `[]` when the input value is
///   absent or not an array
/// - every other property is copied as is, or set to null when absent
///
/// Projecting an already projected record against the same schema returns an equal record.
pub fn project(input: &Record, schema: &Schema) -> Record {
    let mut output = Record::new();

    for (name, property) in schema.declared_properties() {
        let value = match Shape::of(property) {
            Shape::Object(nested) => Bson::Document(project_value(input.get(name), nested)),
            Shape::ObjectList(items) => match input.get(name) {
                Some(Bson::Array(elements)) => Bson::Array(
                    elements
                        .iter()
                        .map(|element| Bson::Document(project_value(Some(element), items)))
                        .collect(),
                ),
                _ => Bson::Array(Vec::new()),
            },
            Shape::Leaf => input.get(name).cloned().unwrap_or(Bson::Null),
        };

        output.insert(name, value);
    }

    output
}

fn project_value(value: Option<&Bson>, schema: &Schema) -> Record {
    match value {
        Some(Bson::Document(nested)) => project(nested, schema),
        _ => project(&Record::new(), schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDocument;
    use bson::doc;

    const DOCUMENT: &str = r##"
components:
  schemas:
    profile:
      type: object
      properties:
        name: { type: string }
        age: { type: number }
    account:
      type: object
      properties:
        id: { type: string }
        tags:
          type: array
          items: { type: string }
        profile:
          $ref: '#/components/schemas/profile'
        contacts:
          type: array
          items:
            type: object
            properties:
              kind: { type: string }
              value: { type: string }
        settings:
          type: object
    versioned:
      allOf:
        - $ref: '#/components/schemas/account'
        - type: object
          properties:
            version: { type: string }
        - type: string
          description: non-object components contribute nothing
"##;

    fn schema(name: &str) -> Schema {
        SchemaDocument::from_yaml_str(DOCUMENT)
            .unwrap()
            .schema(name)
            .unwrap()
    }

    #[test]
    fn drops_undeclared_and_defaults_missing_fields() {
        let projected = project(
            &doc! { "id": "x", "tags": ["a"], "extra": "drop-me" },
            &schema("account"),
        );

        assert_eq!(
            projected,
            doc! {
                "id": "x",
                "tags": ["a"],
                "profile": { "name": Bson::Null, "age": Bson::Null },
                "contacts": [],
                "settings": Bson::Null,
            }
        );
    }

    #[test]
    fn projects_each_list_element_in_order() {
        let projected = project(
            &doc! {
                "contacts": [
                    { "kind": "email", "value": "a@b.c", "verified": true },
                    "not-a-mapping",
                    { "kind": "phone" },
                ],
            },
            &schema("account"),
        );

        assert_eq!(
            projected.get_array("contacts").unwrap(),
            &vec![
                Bson::Document(doc! { "kind": "email", "value": "a@b.c" }),
                Bson::Document(doc! { "kind": Bson::Null, "value": Bson::Null }),
                Bson::Document(doc! { "kind": "phone", "value": Bson::Null }),
            ]
        );
    }

    #[test]
    fn wrongly_typed_input_falls_back_to_defaults() {
        let projected = project(
            &doc! { "profile": "oops", "contacts": { "kind": "email" }, "tags": "a" },
            &schema("account"),
        );

        assert_eq!(
            projected.get_document("profile").unwrap(),
            &doc! { "name": Bson::Null, "age": Bson::Null }
        );
        assert_eq!(projected.get_array("contacts").unwrap(), &Vec::<Bson>::new());
        assert_eq!(projected.get_str("tags").unwrap(), "a");
    }

    #[test]
    fn object_without_properties_is_copied_verbatim() {
        let projected = project(
            &doc! { "settings": { "theme": "dark" } },
            &schema("account"),
        );

        assert_eq!(
            projected.get_document("settings").unwrap(),
            &doc! { "theme": "dark" }
        );
    }

    #[test]
    fn composed_schemas_flatten_components_in_order() {
        let projected = project(&doc! { "version": "v1", "id": "x" }, &schema("versioned"));
        let keys: Vec<&str> = projected.keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec!["id", "tags", "profile", "contacts", "settings", "version"]
        );
        assert_eq!(projected.get_str("version").unwrap(), "v1");
    }

    #[test]
    fn projection_is_idempotent() {
        let schema = schema("versioned");
        let once = project(
            &doc! {
                "id": "x",
                "profile": { "name": "n", "shoe": 44 },
                "contacts": [{ "kind": "email", "x": 1 }],
                "junk": [1, 2, 3],
            },
            &schema,
        );

        assert_eq!(project(&once, &schema), once);
    }

    #[test]
    fn schema_without_fields_projects_to_empty_record() {
        let projected = project(&doc! { "a": 1 }, &Schema::default());

        assert!(projected.is_empty());
    }
}
