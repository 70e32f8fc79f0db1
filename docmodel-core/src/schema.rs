//! Field descriptors and schema normalization.
//!
//! A model's fields can be declared three ways: as a bare [`FieldType`], as a fully built
//! [`FieldDescriptor`], or declaratively as JSON. Whatever the form, [`normalize`] turns
//! the declaration into a [`FieldDescriptor`] exactly once, when the model is built.
//!
//! # Declarative forms
//!
//! | JSON                                   | Field type                      |
//! |----------------------------------------|---------------------------------|
//! | `"text"`, `"number"`, `"timestamp"`... | the named scalar type           |
//! | `[]`                                   | heterogeneous array             |
//! | `["text"]`                             | array of text                   |
//! | `{"ref": "users"}`                     | reference to the `users` model  |
//! | `{"type": ..., "required": true, ...}` | any of the above, with options  |

use std::{fmt, sync::Arc};

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    types::FieldType,
    value::Value,
};

/// A field default: either a literal value or a producer invoked per instance.
#[derive(Clone)]
pub enum DefaultValue {
    /// Cloned into every new instance.
    Literal(Value),
    /// Invoked once per new instance.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Resolves the default for a new instance.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f
                .debug_tuple("Literal")
                .field(value)
                .finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A custom validation predicate.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl Validator {
    pub fn new(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Returns true if `value` passes the predicate.
    pub fn check(&self, value: &Value) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// The normalized description of a schema field.
///
/// Every option is optional, and an absent constraint always passes validation.
///
/// # Example
///
/// ```ignore
/// let age = FieldDescriptor::new(FieldType::Number)
///     .required()
///     .min(0.0)
///     .max(150.0);
/// ```
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The declared type.
    pub field_type: FieldType,
    /// Whether an empty value fails validation.
    pub required: bool,
    /// The value a new instance starts with.
    pub default: Option<DefaultValue>,
    /// The values the field is restricted to.
    pub choices: Option<Vec<Value>>,
    /// Inclusive numeric lower bound.
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    pub max: Option<f64>,
    /// Pattern text values must match.
    pub pattern: Option<Regex>,
    /// Whether the store should index the field as unique.
    pub unique: bool,
    /// Whether the field is hidden from the wire form.
    pub private: bool,
    /// Custom predicate run last.
    pub validator: Option<Validator>,
}

impl FieldDescriptor {
    /// Creates a descriptor with no constraints.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            choices: None,
            min: None,
            max: None,
            pattern: None,
            unique: false,
            private: false,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a literal default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Sets a default produced per instance, such as the current time.
    pub fn default_with(mut self, produce: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Producer(Arc::new(produce)));
        self
    }

    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(
            choices
                .into_iter()
                .map(Into::into)
                .collect(),
        );
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Restricts text values to those matching `pattern`.
    pub fn matches(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Attaches a custom predicate, checked after every other constraint.
    pub fn validate(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Validator::new(predicate));
        self
    }

    /// Resolves the default value for a new instance.
    ///
    /// Typed arrays without a default start out empty; every other field starts as `Null`.
    pub fn resolve_default(&self) -> Value {
        match (&self.default, &self.field_type) {
            (Some(default), _) => default.resolve(),
            (None, FieldType::TypedArray(_)) => Value::Array(Vec::new()),
            (None, _) => Value::Null,
        }
    }
}

impl From<FieldType> for FieldDescriptor {
    fn from(field_type: FieldType) -> Self {
        FieldDescriptor::new(field_type)
    }
}

/// A field declaration in any of its accepted forms.
#[derive(Debug, Clone)]
pub enum FieldDeclaration {
    /// A bare type with no options.
    Type(FieldType),
    /// A fully built descriptor.
    Descriptor(FieldDescriptor),
    /// A declarative JSON form.
    Declarative(JsonValue),
}

impl From<FieldType> for FieldDeclaration {
    fn from(field_type: FieldType) -> Self {
        FieldDeclaration::Type(field_type)
    }
}

impl From<FieldDescriptor> for FieldDeclaration {
    fn from(descriptor: FieldDescriptor) -> Self {
        FieldDeclaration::Descriptor(descriptor)
    }
}

impl From<JsonValue> for FieldDeclaration {
    fn from(json: JsonValue) -> Self {
        FieldDeclaration::Declarative(json)
    }
}

/// Normalizes a field declaration into a descriptor.
///
/// # Arguments
///
/// * `field` - The field name, used in error messages
/// * `declaration` - The declaration to normalize
///
/// # Errors
///
/// Returns [`DocumentStoreError::SchemaDefinition`] if a declarative form names an
/// unknown type, a typed array lists more than one inner type, an option has the wrong
/// shape, or a `match` pattern does not compile.
pub fn normalize(
    field: &str,
    declaration: FieldDeclaration,
) -> DocumentStoreResult<FieldDescriptor> {
    match declaration {
        FieldDeclaration::Type(field_type) => Ok(FieldDescriptor::new(field_type)),
        FieldDeclaration::Descriptor(descriptor) => Ok(descriptor),
        FieldDeclaration::Declarative(json) => normalize_json(field, &json),
    }
}

fn schema_error(field: &str, reason: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::SchemaDefinition {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn normalize_json(field: &str, json: &JsonValue) -> DocumentStoreResult<FieldDescriptor> {
    match json {
        JsonValue::Object(options) => match options.get("type") {
            Some(declared) => {
                let field_type = parse_type(field, declared)?;

                apply_options(field, FieldDescriptor::new(field_type), options)
            }
            None => parse_type(field, json).map(FieldDescriptor::new),
        },
        other => parse_type(field, other).map(FieldDescriptor::new),
    }
}

fn parse_type(field: &str, json: &JsonValue) -> DocumentStoreResult<FieldType> {
    match json {
        JsonValue::String(token) => FieldType::from_token(token)
            .ok_or_else(|| schema_error(field, format!("unsupported type `{token}`"))),
        JsonValue::Array(items) => match items.as_slice() {
            [] => Ok(FieldType::Array),
            [inner] => Ok(FieldType::array_of(parse_type(field, inner)?)),
            _ => Err(schema_error(
                field,
                format!("typed arrays take one inner type, got {}", items.len()),
            )),
        },
        JsonValue::Object(map) => match map.get("ref") {
            Some(JsonValue::String(model)) => Ok(FieldType::reference(model.as_str())),
            Some(other) => Err(schema_error(
                field,
                format!("reference target must be a model name, got {other}"),
            )),
            None => Err(schema_error(field, format!("unsupported type {json}"))),
        },
        other => Err(schema_error(field, format!("unsupported type {other}"))),
    }
}

fn apply_options(
    field: &str,
    mut descriptor: FieldDescriptor,
    options: &Map<String, JsonValue>,
) -> DocumentStoreResult<FieldDescriptor> {
    for (key, option) in options {
        match key.as_str() {
            "type" => {}
            "required" => descriptor.required = expect_bool(field, key, option)?,
            "unique" => descriptor.unique = expect_bool(field, key, option)?,
            "private" => descriptor.private = expect_bool(field, key, option)?,
            "default" => {
                descriptor.default = Some(DefaultValue::Literal(Value::from_json(option)));
            }
            "choices" => match option {
                JsonValue::Array(choices) => {
                    descriptor.choices = Some(
                        choices
                            .iter()
                            .map(Value::from_json)
                            .collect(),
                    );
                }
                other => {
                    return Err(schema_error(
                        field,
                        format!("`choices` must be an array, got {other}"),
                    ));
                }
            },
            "min" => descriptor.min = Some(expect_number(field, key, option)?),
            "max" => descriptor.max = Some(expect_number(field, key, option)?),
            "match" => {
                let pattern = option
                    .as_str()
                    .ok_or_else(|| schema_error(field, "`match` must be a string"))?;
                let regex = Regex::new(pattern)
                    .map_err(|err| schema_error(field, format!("invalid pattern: {err}")))?;

                descriptor.pattern = Some(regex);
            }
            other => {
                return Err(schema_error(field, format!("unknown option `{other}`")));
            }
        }
    }

    Ok(descriptor)
}

fn expect_bool(field: &str, key: &str, option: &JsonValue) -> DocumentStoreResult<bool> {
    option
        .as_bool()
        .ok_or_else(|| schema_error(field, format!("`{key}` must be a boolean, got {option}")))
}

fn expect_number(field: &str, key: &str, option: &JsonValue) -> DocumentStoreResult<f64> {
    option
        .as_f64()
        .ok_or_else(|| schema_error(field, format!("`{key}` must be a number, got {option}")))
}

/// The ordered field set of a model.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    identity: bool,
    fields: Vec<(String, FieldDescriptor)>,
}

impl Schema {
    pub(crate) fn new(identity: bool, fields: Vec<(String, FieldDescriptor)>) -> Self {
        Self { identity, fields }
    }

    /// Returns true if documents of this schema carry the `_id` identity field.
    pub fn has_identity(&self) -> bool {
        self.identity
    }

    /// Iterates fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn get(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Returns the reference fields and the model each one targets, in declaration order.
    pub fn reference_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields()
            .filter_map(|(name, descriptor)| {
                descriptor
                    .field_type
                    .reference_target()
                    .map(|target| (name, target))
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
