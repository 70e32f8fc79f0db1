//! Escaping of record keys MongoDB refuses to store.
//!
//! MongoDB field names may not contain `.` (the path separator) or start with `$` (the
//! operator prefix), and the null byte terminates names. Untyped object fields can hold
//! arbitrary keys, so keys are escaped on the way in and restored on the way out. Values
//! are left untouched.

use bson::{Bson, Document};

/// Escapes and restores record keys.
pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Escapes every key of `record`, recursively.
    pub(crate) fn sanitize(record: Document) -> Document {
        record
            .into_iter()
            .map(|(key, value)| (Self::sanitize_key(&key), Self::map_value(value, Self::sanitize)))
            .collect()
    }

    /// Restores every key of `record`, recursively.
    pub(crate) fn restore(record: Document) -> Document {
        record
            .into_iter()
            .map(|(key, value)| (Self::restore_key(&key), Self::map_value(value, Self::restore)))
            .collect()
    }

    fn map_value(value: Bson, map: fn(Document) -> Document) -> Bson {
        match value {
            Bson::Document(nested) => Bson::Document(map(nested)),
            Bson::Array(items) => Bson::Array(
                items
                    .into_iter()
                    .map(|item| Self::map_value(item, map))
                    .collect(),
            ),
            other => other,
        }
    }

    fn sanitize_key(key: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .fold(key.to_string(), |key, (target, replacement)| key.replace(target, replacement))
    }

    fn restore_key(key: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .rev()
            .fold(key.to_string(), |key, (target, replacement)| key.replace(replacement, target))
    }
}
