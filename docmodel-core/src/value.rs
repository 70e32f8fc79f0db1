//! Dynamic field values and document identities.
//!
//! A [`Value`] is what a document field holds in memory. It is deliberately richer than the
//! storage representation: a field may hold a live [`Document`] (an embedded document, or a
//! populated reference), which only collapses to BSON when the owning document is serialized.

use std::{collections::BTreeMap, fmt};

use bson::{Binary, Bson, oid::ObjectId, spec::BinarySubtype};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as JsonValue};
use uuid::Uuid;

use crate::document::Document;

/// The identity of a persisted top-level document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A UUID, native to the in-memory store.
    Uuid(Uuid),
    /// A BSON object id, native to MongoDB.
    ObjectId(ObjectId),
}

impl Identity {
    /// Returns the kind of this identity.
    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::Uuid(_) => IdentityKind::Uuid,
            Identity::ObjectId(_) => IdentityKind::ObjectId,
        }
    }

    /// Converts this identity to its BSON storage form.
    pub fn to_bson(&self) -> Bson {
        match self {
            Identity::Uuid(uuid) => Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid,
                bytes: uuid.as_bytes().to_vec(),
            }),
            Identity::ObjectId(oid) => Bson::ObjectId(*oid),
        }
    }

    /// Reads an identity from its BSON storage form.
    ///
    /// Returns `None` if the value is neither an object id nor a UUID binary.
    pub fn from_bson(bson: &Bson) -> Option<Self> {
        match bson {
            Bson::ObjectId(oid) => Some(Identity::ObjectId(*oid)),
            Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid => {
                Uuid::from_slice(&binary.bytes)
                    .ok()
                    .map(Identity::Uuid)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Uuid(uuid) => write!(f, "{uuid}"),
            Identity::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
        }
    }
}

impl From<Uuid> for Identity {
    fn from(uuid: Uuid) -> Self {
        Identity::Uuid(uuid)
    }
}

impl From<ObjectId> for Identity {
    fn from(oid: ObjectId) -> Self {
        Identity::ObjectId(oid)
    }
}

/// The native identity type of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// Identities are UUIDs.
    Uuid,
    /// Identities are BSON object ids.
    ObjectId,
}

impl IdentityKind {
    /// Generates a fresh identity of this kind.
    pub fn generate(self) -> Identity {
        match self {
            IdentityKind::Uuid => Identity::Uuid(Uuid::new_v4()),
            IdentityKind::ObjectId => Identity::ObjectId(ObjectId::new()),
        }
    }

    /// Returns true if `value` is a bare identity of this kind.
    ///
    /// Identity values are recognized directly, and so is their canonical text form
    /// (a hyphenated UUID, or a 24 character hex object id).
    pub fn is_native(self, value: &Value) -> bool {
        match value {
            Value::Id(identity) => identity.kind() == self,
            Value::Text(_) => self.parse(value).is_some(),
            _ => false,
        }
    }

    /// Resolves `value` into a comparable identity, if it holds one.
    ///
    /// Identity values of any kind are returned as-is; text is parsed as this kind.
    pub fn parse(self, value: &Value) -> Option<Identity> {
        match value {
            Value::Id(identity) => Some(identity.clone()),
            Value::Text(text) => match self {
                IdentityKind::Uuid => Uuid::parse_str(text)
                    .ok()
                    .map(Identity::Uuid),
                IdentityKind::ObjectId => ObjectId::parse_str(text)
                    .ok()
                    .map(Identity::ObjectId),
            },
            _ => None,
        }
    }
}

/// A dynamically typed field value.
///
/// `Null` doubles as the "unset" marker: a schema field that was never assigned holds `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integral number.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// A point in time.
    Timestamp(DateTime<Utc>),
    /// An untyped object.
    Object(BTreeMap<String, Value>),
    /// An array of values.
    Array(Vec<Value>),
    /// A bare document identity, as held by an unpopulated reference.
    Id(Identity),
    /// A live document instance: either an embedded document or a populated reference.
    Document(Box<Document>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the numeric value as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }

    /// Compares two values, treating integers and floats with the same magnitude as equal.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => self == other,
        }
    }

    /// Converts a raw BSON value into a field value, without any schema knowledge.
    ///
    /// BSON types with no counterpart (regular expressions, code, decimals, ...) are kept
    /// as their textual representation.
    pub fn from_bson(bson: Bson) -> Value {
        match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(value) => Value::Bool(value),
            Bson::Int32(value) => Value::Int(i64::from(value)),
            Bson::Int64(value) => Value::Int(value),
            Bson::Double(value) => Value::Float(value),
            Bson::String(value) => Value::Text(value),
            Bson::DateTime(value) => DateTime::from_timestamp_millis(value.timestamp_millis())
                .map(Value::Timestamp)
                .unwrap_or(Value::Null),
            Bson::ObjectId(oid) => Value::Id(Identity::ObjectId(oid)),
            Bson::Binary(binary) => match Uuid::from_slice(&binary.bytes) {
                Ok(uuid) if binary.subtype == BinarySubtype::Uuid => {
                    Value::Id(Identity::Uuid(uuid))
                }
                _ => Value::Binary(binary.bytes),
            },
            Bson::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::from_bson)
                    .collect(),
            ),
            Bson::Document(doc) => Value::Object(
                doc.into_iter()
                    .map(|(k, v)| (k, Value::from_bson(v)))
                    .collect(),
            ),
            other => Value::Text(other.to_string()),
        }
    }

    /// Converts this value to BSON for storage.
    ///
    /// Embedded documents become their own storage form, and live reference instances
    /// are reduced to their identity (or `null` if they were never saved).
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Bool(value) => Bson::Boolean(*value),
            Value::Int(value) => Bson::Int64(*value),
            Value::Float(value) => Bson::Double(*value),
            Value::Text(value) => Bson::String(value.clone()),
            Value::Binary(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }),
            Value::Timestamp(value) => {
                Bson::DateTime(bson::DateTime::from_millis(value.timestamp_millis()))
            }
            Value::Object(map) => Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_bson()))
                    .collect(),
            ),
            Value::Array(items) => Bson::Array(
                items
                    .iter()
                    .map(Value::to_bson)
                    .collect(),
            ),
            Value::Id(identity) => identity.to_bson(),
            Value::Document(document) if document.is_embedded() => {
                Bson::Document(document.to_storage_form(false))
            }
            Value::Document(document) => document
                .id()
                .map(Identity::to_bson)
                .unwrap_or(Bson::Null),
        }
    }

    /// Converts a JSON value into a field value.
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(value) => Value::Bool(*value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => number
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
            },
            JsonValue::String(value) => Value::Text(value.clone()),
            JsonValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect(),
            ),
            JsonValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Projects this value to JSON.
    ///
    /// Identities become their canonical string, timestamps RFC 3339 strings and nested
    /// documents their own wire form.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(value) => JsonValue::Bool(*value),
            Value::Int(value) => JsonValue::Number((*value).into()),
            Value::Float(value) => Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(value) => JsonValue::String(value.clone()),
            Value::Binary(bytes) => JsonValue::Array(
                bytes
                    .iter()
                    .map(|byte| JsonValue::Number((*byte).into()))
                    .collect(),
            ),
            Value::Timestamp(value) => {
                JsonValue::String(value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect(),
            ),
            Value::Id(identity) => JsonValue::String(identity.to_string()),
            Value::Document(document) => document.to_wire_form(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Document(document) => match document.id() {
                Some(id) => write!(f, "{}({id})", document.model().name()),
                None => write!(f, "{}(unsaved)", document.model().name()),
            },
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Identity> for Value {
    fn from(value: Identity) -> Self {
        Value::Id(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(Box::new(value))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(
            items
                .into_iter()
                .map(Into::into)
                .collect(),
        )
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
