//! Schema validation of document instances.

use crate::{
    document::Document,
    error::{DocumentStoreResult, ValidationError, ValidationErrorKind},
    schema::FieldDescriptor,
    types::is_empty_value,
    value::{IdentityKind, Value},
};

static NULL: Value = Value::Null;

impl Document {
    /// Validates every field against the schema, in declaration order.
    ///
    /// A field holding an embedded document is validated by that document's own schema, as
    /// is every embedded element of an array whose first element is embedded. Any other
    /// value goes through the field's constraints: type, required, pattern, choices, min,
    /// max, then the custom validator. The first violation wins.
    ///
    /// # Arguments
    ///
    /// * `identity` - The store's native identity kind, used to accept bare references
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`](crate::error::DocumentStoreError::Validation)
    /// naming the collection, field and offending value.
    pub fn validate(&self, identity: IdentityKind) -> DocumentStoreResult<()> {
        let collection = self.model().name();

        for (name, descriptor) in self.model().schema().fields() {
            let value = self.get(name).unwrap_or(&NULL);

            match value {
                Value::Document(embedded) if embedded.is_embedded() => {
                    embedded.validate(identity)?;
                    continue;
                }
                Value::Array(items) if items.first().is_some_and(is_embedded_document) => {
                    for item in items {
                        if let Value::Document(embedded) = item {
                            embedded.validate(identity)?;
                        }
                    }
                    continue;
                }
                _ => {}
            }

            check_value(descriptor, value, identity).map_err(|kind| {
                ValidationError::new(collection, name, value.clone(), kind)
            })?;
        }

        Ok(())
    }
}

fn is_embedded_document(value: &Value) -> bool {
    value
        .as_document()
        .is_some_and(Document::is_embedded)
}

fn check_value(
    descriptor: &FieldDescriptor,
    value: &Value,
    identity: IdentityKind,
) -> Result<(), ValidationErrorKind> {
    if !descriptor
        .field_type
        .is_of_type(value, identity)
    {
        return Err(ValidationErrorKind::TypeMismatch {
            expected: descriptor.field_type.to_string(),
        });
    }

    if descriptor.required && is_empty_value(value) {
        return Err(ValidationErrorKind::Required);
    }

    if let (Some(pattern), Value::Text(text)) = (&descriptor.pattern, value) {
        if !pattern.is_match(text) {
            return Err(ValidationErrorKind::Match {
                pattern: pattern.as_str().to_string(),
            });
        }
    }

    if let Some(choices) = &descriptor.choices {
        if !choices
            .iter()
            .any(|choice| choice.loosely_equals(value))
        {
            return Err(ValidationErrorKind::Choices {
                choices: choices.clone(),
            });
        }
    }

    if let (Some(min), Some(number)) = (descriptor.min, value.as_f64()) {
        if number < min {
            return Err(ValidationErrorKind::BelowMin { min });
        }
    }

    if let (Some(max), Some(number)) = (descriptor.max, value.as_f64()) {
        if number > max {
            return Err(ValidationErrorKind::AboveMax { max });
        }
    }

    if let Some(validator) = &descriptor.validator {
        if !validator.check(value) {
            return Err(ValidationErrorKind::Custom);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use regex::Regex;

    use super::*;
    use crate::{error::DocumentStoreError, model::Model, types::FieldType};

    const KIND: IdentityKind = IdentityKind::Uuid;

    fn kind_of(result: DocumentStoreResult<()>) -> Option<(String, ValidationErrorKind)> {
        match result {
            Err(DocumentStoreError::Validation(err)) => Some((err.field, err.kind)),
            _ => None,
        }
    }

    fn single(descriptor: FieldDescriptor, value: impl Into<Value>) -> DocumentStoreResult<()> {
        let model = Model::document("things")
            .field("field", descriptor)
            .build()
            .unwrap();
        let mut document = Document::new(&model);

        document.set("field", value).unwrap();
        document.validate(KIND)
    }

    #[test]
    fn type_is_checked_before_choices() {
        let descriptor = FieldDescriptor::new(FieldType::Number).choices([1, 2, 3]);

        assert!(matches!(
            kind_of(single(descriptor.clone(), "x")),
            Some((_, ValidationErrorKind::TypeMismatch { .. }))
        ));
        assert!(matches!(
            kind_of(single(descriptor.clone(), 4)),
            Some((_, ValidationErrorKind::Choices { .. }))
        ));
        assert!(single(descriptor, 2.0).is_ok());
    }

    #[test]
    fn required_rejects_empty_values() {
        let descriptor = FieldDescriptor::new(FieldType::Text).required();

        assert!(matches!(
            kind_of(single(descriptor.clone(), "")),
            Some((_, ValidationErrorKind::Required))
        ));
        assert!(matches!(
            kind_of(single(descriptor.clone(), Value::Null)),
            Some((_, ValidationErrorKind::Required))
        ));
        assert!(single(descriptor, "present").is_ok());
    }

    #[test]
    fn bounds_and_patterns() {
        let age = FieldDescriptor::new(FieldType::Number)
            .min(0.0)
            .max(150.0);
        let slug = FieldDescriptor::new(FieldType::Text).matches(Regex::new("^[a-z-]+$").unwrap());

        assert!(matches!(
            kind_of(single(age.clone(), -1)),
            Some((_, ValidationErrorKind::BelowMin { .. }))
        ));
        assert!(matches!(
            kind_of(single(age.clone(), 151)),
            Some((_, ValidationErrorKind::AboveMax { .. }))
        ));
        assert!(single(age, 150).is_ok());
        assert!(matches!(
            kind_of(single(slug.clone(), "Not A Slug")),
            Some((_, ValidationErrorKind::Match { .. }))
        ));
        assert!(single(slug, "a-slug").is_ok());
    }

    #[test]
    fn absent_constraints_pass() {
        assert!(single(FieldDescriptor::new(FieldType::Number), 1e12).is_ok());
        assert!(single(FieldDescriptor::new(FieldType::Text), Value::Null).is_ok());
    }

    #[test]
    fn custom_validator_runs_last() {
        let even = FieldDescriptor::new(FieldType::Number)
            .validate(|value| value.as_f64().is_some_and(|n| n % 2.0 == 0.0));

        assert!(single(even.clone(), 4).is_ok());
        assert!(matches!(
            kind_of(single(even, 3)),
            Some((_, ValidationErrorKind::Custom))
        ));
    }

    #[test]
    fn embedded_documents_validate_with_their_own_schema() {
        let address: Arc<Model> = Model::embedded("address")
            .field("zip", FieldDescriptor::new(FieldType::Text).required())
            .build()
            .unwrap();
        let person = Model::document("people")
            .field("home", FieldType::embedded(&address))
            .field("previous", FieldType::array_of(FieldType::embedded(&address)))
            .build()
            .unwrap();

        let mut document = Document::new(&person);
        document
            .set("home", Document::new(&address))
            .unwrap();

        let err = document.validate(KIND).unwrap_err();

        assert!(matches!(
            err,
            DocumentStoreError::Validation(ref failure)
                if failure.collection == "address" && failure.field == "zip"
        ));

        let mut filled = Document::new(&address);
        filled.set("zip", "75001").unwrap();
        document.set("home", filled.clone()).unwrap();
        document
            .set(
                "previous",
                vec![Value::from(filled), Value::from(Document::new(&address))],
            )
            .unwrap();

        assert!(matches!(
            kind_of(document.validate(KIND)),
            Some((field, ValidationErrorKind::Required)) if field == "zip"
        ));
    }

    #[test]
    fn error_names_collection_field_and_value() {
        let err = single(FieldDescriptor::new(FieldType::Boolean), "yes").unwrap_err();

        assert_eq!(
            err.to_string(),
            "Value assigned to things.field should be boolean, got \"yes\""
        );
    }
}
