//! Error types and result types for document model operations.
//!
//! Every fallible operation in the engine returns [`DocumentStoreResult<T>`]. Errors raised
//! by a storage backend or by a lifecycle hook are propagated to the caller unchanged.

use std::fmt;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::value::Value;

/// Represents all possible errors that can occur when modeling, validating or persisting documents.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A client payload could not be parsed as JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The connection string names a scheme no backend is registered for.
    #[error("Unsupported connection scheme: {0}")]
    UnsupportedScheme(String),
    /// A field declaration could not be normalized into a field descriptor.
    #[error("Invalid schema for field `{field}`: {reason}")]
    SchemaDefinition {
        /// The offending field name.
        field: String,
        /// Why the declaration was rejected.
        reason: String,
    },
    /// A document failed validation against its schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A lifecycle hook rejected the operation.
    #[error("Hook rejected operation: {0}")]
    Hook(String),
    /// A reference field names a model that was never registered on the database.
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    /// A write would violate a unique index.
    /// The first argument is the field, the second is the collection name.
    #[error("Duplicate value for unique field {0} in collection {1}")]
    UniqueViolation(String, String),
    /// The document is in a state that does not allow the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document model operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// The rule a value violated during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    /// The value does not structurally match the declared type.
    TypeMismatch {
        /// Human readable name of the declared type.
        expected: String,
    },
    /// The field is required but holds an empty value.
    Required,
    /// A text value does not match the declared pattern.
    Match {
        /// The pattern source.
        pattern: String,
    },
    /// The value is not one of the declared choices.
    Choices {
        /// The allowed values.
        choices: Vec<Value>,
    },
    /// A numeric value is below the declared minimum.
    BelowMin {
        /// The declared minimum.
        min: f64,
    },
    /// A numeric value is above the declared maximum.
    AboveMax {
        /// The declared maximum.
        max: f64,
    },
    /// The custom validator rejected the value.
    Custom,
}

/// A schema violation, naming the collection, field and offending value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// The collection (model) name of the document being validated.
    pub collection: String,
    /// The field that failed validation.
    pub field: String,
    /// The offending value.
    pub value: Value,
    /// The violated rule.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: Value,
        kind: ValidationErrorKind,
    ) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            value,
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = format!("{}.{}", self.collection, self.field);

        match &self.kind {
            ValidationErrorKind::TypeMismatch { expected } => write!(
                f,
                "Value assigned to {key} should be {expected}, got {}",
                self.value
            ),
            ValidationErrorKind::Required => {
                write!(f, "Key {key} is required, but got {}", self.value)
            }
            ValidationErrorKind::Match { pattern } => write!(
                f,
                "Value assigned to {key} does not match the pattern {pattern}, got {}",
                self.value
            ),
            ValidationErrorKind::Choices { choices } => write!(
                f,
                "Value assigned to {key} should be in choices [{}], got {}",
                choices
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                self.value
            ),
            ValidationErrorKind::BelowMin { min } => write!(
                f,
                "Value assigned to {key} is less than min, {min}, got {}",
                self.value
            ),
            ValidationErrorKind::AboveMax { max } => write!(
                f,
                "Value assigned to {key} is greater than max, {max}, got {}",
                self.value
            ),
            ValidationErrorKind::Custom => write!(
                f,
                "Value assigned to {key} failed custom validator. Value was {}",
                self.value
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
