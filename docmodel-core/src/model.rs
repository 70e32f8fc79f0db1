//! Document models: a named schema plus optional hooks and virtual setters.
//!
//! Models are built once with a [`ModelBuilder`] and shared as `Arc<Model>`. Every
//! [`Document`] holds the model it was created from.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let users = Model::document("users")
//!     .field("name", FieldDescriptor::new(FieldType::Text).required())
//!     .field("tags", json!(["text"]))
//!     .build()?;
//! ```

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    hooks::Hooks,
    schema::{FieldDeclaration, Schema, normalize},
    types::FieldType,
    value::Value,
};

/// Whether a model describes top-level or embedded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Persisted in its own collection, with an identity.
    Document,
    /// Stored inline inside a parent document, without an identity.
    Embedded,
}

/// Handles assignment to a key that is not a schema field.
pub type VirtualSetter = Arc<dyn Fn(&mut Document, Value) -> DocumentStoreResult<()> + Send + Sync>;

/// A document model.
pub struct Model {
    name: String,
    kind: ModelKind,
    schema: Schema,
    hooks: Option<Arc<dyn Hooks>>,
    setters: HashMap<String, VirtualSetter>,
}

impl Model {
    /// Starts building a top-level model stored in the collection `name`.
    pub fn document(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name.into(), ModelKind::Document)
    }

    /// Starts building an embedded model.
    pub fn embedded(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name.into(), ModelKind::Embedded)
    }

    /// The model name, which doubles as the collection name for top-level models.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_embedded(&self) -> bool {
        self.kind == ModelKind::Embedded
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn hooks(&self) -> Option<&Arc<dyn Hooks>> {
        self.hooks.as_ref()
    }

    /// Returns the virtual setter registered for `key`, if any.
    pub fn setter(&self, key: &str) -> Option<&VirtualSetter> {
        self.setters.get(key)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut setters = self
            .setters
            .keys()
            .collect::<Vec<_>>();
        setters.sort();

        f.debug_struct("Model")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("schema", &self.schema)
            .field("hooks", &self.hooks.is_some())
            .field("setters", &setters)
            .finish()
    }
}

/// Builder for [`Model`].
pub struct ModelBuilder {
    name: String,
    kind: ModelKind,
    fields: Vec<(String, FieldDeclaration)>,
    hooks: Option<Arc<dyn Hooks>>,
    setters: HashMap<String, VirtualSetter>,
}

impl ModelBuilder {
    fn new(name: String, kind: ModelKind) -> Self {
        Self {
            name,
            kind,
            fields: Vec::new(),
            hooks: None,
            setters: HashMap::new(),
        }
    }

    /// Declares a field. Fields keep their declaration order.
    pub fn field(mut self, name: impl Into<String>, declaration: impl Into<FieldDeclaration>) -> Self {
        self.fields
            .push((name.into(), declaration.into()));
        self
    }

    /// Attaches lifecycle hooks.
    pub fn hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Registers a setter for a key that is not a schema field.
    ///
    /// The setter runs when such a key is assigned with [`Document::set`] or appears in a
    /// loaded record.
    pub fn virtual_setter(
        mut self,
        key: impl Into<String>,
        setter: impl Fn(&mut Document, Value) -> DocumentStoreResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.setters
            .insert(key.into(), Arc::new(setter));
        self
    }

    /// Normalizes every field declaration and builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::SchemaDefinition`] if the model name is empty, a field
    /// name is empty, starts with `_` or is declared twice, a declaration does not
    /// normalize, or an embedded field names a top-level model.
    pub fn build(self) -> DocumentStoreResult<Arc<Model>> {
        if self.name.is_empty() {
            return Err(DocumentStoreError::SchemaDefinition {
                field: String::new(),
                reason: "model name must not be empty".to_string(),
            });
        }

        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, declaration) in self.fields {
            if name.is_empty() || name.starts_with('_') {
                return Err(DocumentStoreError::SchemaDefinition {
                    reason: format!("field names must not be empty or start with `_` in {}", self.name),
                    field: name,
                });
            }

            if fields
                .iter()
                .any(|(existing, _)| *existing == name)
            {
                return Err(DocumentStoreError::SchemaDefinition {
                    reason: format!("declared twice in {}", self.name),
                    field: name,
                });
            }

            let descriptor = normalize(&name, declaration)?;

            if let FieldType::Embedded(model) = &descriptor.field_type {
                if !model.is_embedded() {
                    return Err(DocumentStoreError::SchemaDefinition {
                        reason: format!("{} is not an embedded model", model.name()),
                        field: name,
                    });
                }
            }

            fields.push((name, descriptor));
        }

        Ok(Arc::new(Model {
            schema: Schema::new(self.kind == ModelKind::Document, fields),
            name: self.name,
            kind: self.kind,
            hooks: self.hooks,
            setters: self.setters,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::FieldDescriptor;

    #[test]
    fn builds_fields_in_declaration_order() {
        let model = Model::document("users")
            .field("name", FieldType::Text)
            .field("age", FieldDescriptor::new(FieldType::Number).min(0.0))
            .field("tags", json!(["text"]))
            .build()
            .unwrap();

        let names = model
            .schema()
            .fields()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["name", "age", "tags"]);
        assert!(model.schema().has_identity());
        assert!(!model.is_embedded());
    }

    #[test]
    fn embedded_models_have_no_identity() {
        let address = Model::embedded("address")
            .field("city", FieldType::Text)
            .build()
            .unwrap();

        assert!(!address.schema().has_identity());
        assert!(address.is_embedded());
    }

    #[test]
    fn rejects_reserved_and_duplicate_names() {
        let reserved = Model::document("users")
            .field("_id", FieldType::Text)
            .build();
        let duplicate = Model::document("users")
            .field("name", FieldType::Text)
            .field("name", FieldType::Number)
            .build();

        assert!(matches!(
            reserved,
            Err(DocumentStoreError::SchemaDefinition { .. })
        ));
        assert!(matches!(
            duplicate,
            Err(DocumentStoreError::SchemaDefinition { .. })
        ));
    }

    #[test]
    fn rejects_top_level_model_as_embedded() {
        let users = Model::document("users")
            .build()
            .unwrap();
        let result = Model::document("posts")
            .field("author", FieldType::embedded(&users))
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn lists_reference_fields() {
        let posts = Model::document("posts")
            .field("title", FieldType::Text)
            .field("author", FieldType::reference("users"))
            .field("editors", json!([{ "ref": "users" }]))
            .build()
            .unwrap();

        let references = posts
            .schema()
            .reference_fields()
            .collect::<Vec<_>>();

        assert_eq!(references, vec![("author", "users"), ("editors", "users")]);
    }
}
