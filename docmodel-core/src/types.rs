//! The field type vocabulary and the structural type check.
//!
//! [`FieldType`] is closed: every type a schema can declare is one of its variants, so a
//! declaration naming anything else is rejected once, when the schema is normalized
//! (see [`crate::schema::normalize`]), and never reaches [`FieldType::is_of_type`].

use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    model::Model,
    value::{IdentityKind, Value},
};

/// The declared type of a schema field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// UTF-8 text.
    Text,
    /// Integral or floating point number.
    Number,
    /// Boolean.
    Boolean,
    /// Raw bytes.
    Binary,
    /// A point in time.
    Timestamp,
    /// An untyped object.
    Object,
    /// An array whose elements may be of any type.
    Array,
    /// An array whose elements all have the inner type.
    TypedArray(Box<FieldType>),
    /// A reference to a top-level document model, by name.
    Reference(String),
    /// An embedded document model.
    Embedded(Arc<Model>),
}

impl FieldType {
    /// Declares an array of `inner`.
    pub fn array_of(inner: FieldType) -> Self {
        FieldType::TypedArray(Box::new(inner))
    }

    /// Declares a reference to the top-level model named `model`.
    pub fn reference(model: impl Into<String>) -> Self {
        FieldType::Reference(model.into())
    }

    /// Declares an embedded document of `model`.
    pub fn embedded(model: &Arc<Model>) -> Self {
        FieldType::Embedded(Arc::clone(model))
    }

    /// Parses a declarative type token such as `"text"` or `"timestamp"`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "text" | "string" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "boolean" | "bool" => Some(FieldType::Boolean),
            "binary" | "buffer" => Some(FieldType::Binary),
            "timestamp" | "date" => Some(FieldType::Timestamp),
            "object" => Some(FieldType::Object),
            "array" => Some(FieldType::Array),
            _ => None,
        }
    }

    /// Returns the name of the referenced model, for references and arrays of references.
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            FieldType::Reference(model) => Some(model),
            FieldType::TypedArray(inner) => match inner.as_ref() {
                FieldType::Reference(model) => Some(model),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns true for timestamps and arrays of timestamps.
    pub fn is_timestamp(&self) -> bool {
        match self {
            FieldType::Timestamp => true,
            FieldType::TypedArray(inner) => matches!(inner.as_ref(), FieldType::Timestamp),
            _ => false,
        }
    }

    /// Returns true if `value` structurally matches this type.
    ///
    /// `Null` matches every type. References accept an instance of the target model, or
    /// any bare identity recognized by `identity`.
    pub fn is_of_type(&self, value: &Value, identity: IdentityKind) -> bool {
        if value.is_null() {
            return true;
        }

        match self {
            FieldType::Text => matches!(value, Value::Text(_)),
            FieldType::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            FieldType::Boolean => matches!(value, Value::Bool(_)),
            FieldType::Binary => matches!(value, Value::Binary(_)),
            FieldType::Timestamp => parse_timestamp(value).is_some(),
            FieldType::Object => matches!(value, Value::Object(_)),
            FieldType::Array => matches!(value, Value::Array(_)),
            FieldType::TypedArray(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .all(|item| inner.is_of_type(item, identity)),
                _ => false,
            },
            FieldType::Reference(model) => match value {
                Value::Document(document) => {
                    !document.is_embedded() && document.model().name() == model
                }
                other => identity.is_native(other),
            },
            FieldType::Embedded(model) => match value {
                Value::Document(document) => {
                    document.is_embedded() && document.model().name() == model.name()
                }
                _ => false,
            },
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::TypedArray(a), FieldType::TypedArray(b)) => a == b,
            (FieldType::Reference(a), FieldType::Reference(b)) => a == b,
            (FieldType::Embedded(a), FieldType::Embedded(b)) => a.name() == b.name(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Binary => write!(f, "binary"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Object => write!(f, "object"),
            FieldType::Array => write!(f, "array"),
            FieldType::TypedArray(inner) => write!(f, "[{inner}]"),
            FieldType::Reference(model) => write!(f, "reference to {model}"),
            FieldType::Embedded(model) => write!(f, "embedded {}", model.name()),
        }
    }
}

/// Shorthand for [`FieldType::is_of_type`].
pub fn is_of_type(value: &Value, field_type: &FieldType, identity: IdentityKind) -> bool {
    field_type.is_of_type(value, identity)
}

/// Returns true if `value` counts as empty for a `required` field.
///
/// Numbers, booleans, timestamps, identities and documents are never empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Binary(bytes) => bytes.is_empty(),
        _ => false,
    }
}

/// Interprets a date-like value as a timestamp.
///
/// Accepts timestamps, epoch milliseconds, RFC 3339 strings and `YYYY-MM-DD` dates.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(timestamp) => Some(*timestamp),
        Value::Int(millis) => DateTime::from_timestamp_millis(*millis),
        Value::Float(millis) if millis.is_finite() => {
            DateTime::from_timestamp_millis(*millis as i64)
        }
        Value::Text(text) => DateTime::parse_from_rfc3339(text)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}
