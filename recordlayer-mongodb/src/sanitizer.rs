//! Field name escaping for MongoDB.
//!
//! MongoDB reserves `.` and `$` in field names and rejects NUL bytes, while records may use any
//! string as a key. Keys are escaped on the way in and restored on the way out; values are
//! stored untouched so that filters compare against the original data.

use bson::{Bson, Document};

pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    pub(crate) fn sanitize_key(key: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .fold(key.to_string(), |key, (target, replacement)| {
                key.replace(target, replacement)
            })
    }

    pub(crate) fn restore_key(key: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .rev()
            .fold(key.to_string(), |key, (target, replacement)| {
                key.replace(replacement, target)
            })
    }

    /// Escapes every segment of a dotted path, keeping the dots that separate segments.
    pub(crate) fn sanitize_path(path: &str) -> String {
        path.split('.')
            .map(Self::sanitize_key)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(key, value)| (Self::sanitize_key(key), Self::map_value(value, Self::sanitize_document)))
            .collect()
    }

    pub(crate) fn restore_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(key, value)| (Self::restore_key(key), Self::map_value(value, Self::restore_document)))
            .collect()
    }

    fn map_value(value: &Bson, on_document: fn(&Document) -> Document) -> Bson {
        match value {
            Bson::Document(nested) => Bson::Document(on_document(nested)),
            Bson::Array(items) => Bson::Array(
                items
                    .iter()
                    .map(|item| Self::map_value(item, on_document))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn escapes_keys_but_not_values() {
        let record = doc! {
            "a.b": "x.y",
            "$price": { "nested.key": 1 },
            "list": [{ "k.1": "$v" }],
        };
        let stored = KeySanitizer::sanitize_document(&record);

        assert_eq!(
            stored,
            doc! {
                "a__dot__b": "x.y",
                "__dollar__price": { "nested__dot__key": 1 },
                "list": [{ "k__dot__1": "$v" }],
            }
        );
        assert_eq!(KeySanitizer::restore_document(&stored), record);
    }

    #[test]
    fn paths_keep_their_separators() {
        assert_eq!(
            KeySanitizer::sanitize_path("profile.$rate"),
            "profile.__dollar__rate"
        );
    }
}
