//! Document instances and their storage and wire projections.
//!
//! A [`Document`] is a schema-governed bag of [`Value`]s plus the engine's own state: the
//! model it belongs to, its identity once persisted, and its lifecycle state. Every schema
//! field has an entry from construction on, holding `Value::Null` when unset.

use std::{collections::HashMap, fmt, sync::Arc};

use bson::{Bson, Document as Record};
use chrono::DateTime;
use serde_json::{Map, Value as JsonValue};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    types::{FieldType, parse_timestamp},
    value::{Identity, Value},
};

/// Where a document is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Created in memory, never saved.
    #[default]
    Unsaved,
    /// Saved at least once, or loaded from the store.
    Persisted,
    /// Deleted from the store. Terminal.
    Deleted,
}

/// A document instance.
#[derive(Clone)]
pub struct Document {
    model: Arc<Model>,
    id: Option<Identity>,
    state: LifecycleState,
    pub(crate) values: HashMap<String, Value>,
}

impl Document {
    /// Creates a fresh instance with every schema field set to its default.
    pub fn new(model: &Arc<Model>) -> Self {
        let mut document = Self {
            model: Arc::clone(model),
            id: None,
            state: LifecycleState::Unsaved,
            values: HashMap::with_capacity(model.schema().len()),
        };

        document.generate_schema();
        document
    }

    fn generate_schema(&mut self) {
        let model = Arc::clone(&self.model);

        for (name, descriptor) in model.schema().fields() {
            self.values
                .insert(name.to_string(), descriptor.resolve_default());
        }
    }

    /// Evaluates the default for `field`.
    ///
    /// Producers run on every call. Unknown fields and fields without a default yield
    /// `Null`, except typed arrays, which yield an empty array.
    pub fn default_for(&self, field: &str) -> Value {
        self.model
            .schema()
            .get(field)
            .map(|descriptor| descriptor.resolve_default())
            .unwrap_or_default()
    }

    /// Fills in the default of every schema field that has no entry.
    pub fn ensure_defaults(&mut self) {
        let model = Arc::clone(&self.model);

        for (name, descriptor) in model.schema().fields() {
            if !self.values.contains_key(name) {
                self.values
                    .insert(name.to_string(), descriptor.resolve_default());
            }
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The document's identity, set once it has been saved or loaded.
    pub fn id(&self) -> Option<&Identity> {
        self.id.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_embedded(&self) -> bool {
        self.model.is_embedded()
    }

    pub(crate) fn set_id(&mut self, id: Identity) {
        self.id = Some(id);
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    /// Returns the value of a schema field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.values.get_mut(field)
    }

    /// Assigns a field.
    ///
    /// Keys outside the schema are handed to the model's virtual setter for that key.
    /// Values are not checked here; that happens on [`validate`](Document::validate).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the document was deleted or the key
    /// is neither a schema field nor has a virtual setter. Errors from a virtual setter are
    /// returned unchanged.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> DocumentStoreResult<()> {
        if self.state == LifecycleState::Deleted {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "cannot set {field} on a deleted {} document",
                self.model.name()
            )));
        }

        if self.model.schema().contains(field) {
            self.values
                .insert(field.to_string(), value.into());
            return Ok(());
        }

        match self.model.setter(field).cloned() {
            Some(setter) => setter(self, value.into()),
            None => Err(DocumentStoreError::InvalidDocument(format!(
                "{} has no field {field}",
                self.model.name()
            ))),
        }
    }

    /// Resets a field to `Null`, returning the previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values
            .get_mut(field)
            .map(std::mem::take)
    }

    /// Iterates schema fields and their values in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.model
            .schema()
            .fields()
            .filter_map(|(name, _)| {
                self.values
                    .get(name)
                    .map(|value| (name, value))
            })
    }

    /// Normalizes date-like values in timestamp fields to millisecond precision timestamps.
    ///
    /// Recurses into embedded documents, including those held in arrays. Values that do not
    /// read as a date are left alone. Running it twice changes nothing.
    pub fn canonicalize(&mut self) {
        let model = Arc::clone(&self.model);

        for (name, descriptor) in model.schema().fields() {
            let Some(value) = self.values.get_mut(name) else {
                continue;
            };

            match &descriptor.field_type {
                FieldType::Timestamp => canonicalize_timestamp(value),
                FieldType::TypedArray(inner) if matches!(inner.as_ref(), FieldType::Timestamp) => {
                    if let Value::Array(items) = value {
                        items
                            .iter_mut()
                            .for_each(canonicalize_timestamp);
                    }
                }
                _ => canonicalize_embedded(value),
            }
        }
    }

    /// Projects the document to its storage record.
    ///
    /// Embedded documents become nested records, live reference instances collapse to their
    /// identity (or `null` if unsaved), and the identity itself is included only when
    /// `keep_identity` is set.
    ///
    /// Stored timestamps have millisecond precision, so a record read back through
    /// [`from_record`](Document::from_record) equals the original only once the document has
    /// been [canonicalized](Document::canonicalize). Saving always canonicalizes first.
    pub fn to_storage_form(&self, keep_identity: bool) -> Record {
        let mut record = Record::new();

        if keep_identity {
            if let Some(id) = &self.id {
                record.insert("_id", id.to_bson());
            }
        }

        for (name, value) in self.fields() {
            record.insert(name, value.to_bson());
        }

        record
    }

    /// Projects the document to JSON for clients.
    ///
    /// The identity is kept as its canonical string, private fields are dropped, and nested
    /// documents are projected through their own wire form.
    pub fn to_wire_form(&self) -> JsonValue {
        let mut wire = Map::new();

        if let Some(id) = &self.id {
            wire.insert("_id".to_string(), JsonValue::String(id.to_string()));
        }

        for (name, descriptor) in self.model.schema().fields() {
            if descriptor.private {
                continue;
            }

            if let Some(value) = self.values.get(name) {
                wire.insert(name.to_string(), value.to_json());
            }
        }

        JsonValue::Object(wire)
    }

    /// Builds an unsaved document from a JSON payload sent by a client.
    ///
    /// The payload is read like a storage record, so embedded fields are rebuilt and virtual
    /// setters apply. Any `_id` in the payload is ignored: identities are only assigned by
    /// the store.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Serialization`] if `payload` is not valid JSON
    /// - [`DocumentStoreError::InvalidDocument`] if it is not a JSON object
    /// - errors from a virtual setter, unchanged
    pub fn from_wire_str(model: &Arc<Model>, payload: &str) -> DocumentStoreResult<Self> {
        let JsonValue::Object(fields) = serde_json::from_str::<JsonValue>(payload)? else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "{} payload must be a JSON object",
                model.name()
            )));
        };

        let record = fields
            .into_iter()
            .filter(|(key, _)| key != "_id")
            .map(|(key, json)| (key, Value::from_json(&json).to_bson()))
            .collect::<Record>();

        Document::from_record(model, record)
    }

    /// Rehydrates a document from a storage record.
    ///
    /// Embedded fields (and arrays of them) are rebuilt as embedded instances, `_id` is
    /// adopted as the identity, and keys outside the schema go to the model's virtual
    /// setter when one is registered and are ignored otherwise. A document with an identity
    /// comes back persisted.
    ///
    /// # Errors
    ///
    /// Errors from a virtual setter are returned unchanged.
    pub fn from_record(model: &Arc<Model>, record: Record) -> DocumentStoreResult<Self> {
        let mut document = Document::new(model);

        for (key, bson) in record {
            if key == "_id" {
                if let Some(id) = Identity::from_bson(&bson) {
                    document.set_id(id);
                    document.set_state(LifecycleState::Persisted);
                }
                continue;
            }

            let Some(descriptor) = model.schema().get(&key) else {
                if let Some(setter) = model.setter(&key) {
                    setter(&mut document, Value::from_bson(bson))?;
                }
                continue;
            };

            let value = match (&descriptor.field_type, bson) {
                (FieldType::Embedded(embedded), Bson::Document(nested)) => {
                    Value::from(Document::from_record(embedded, nested)?)
                }
                (FieldType::TypedArray(inner), Bson::Array(items)) => match inner.as_ref() {
                    FieldType::Embedded(embedded) => Value::Array(
                        items
                            .into_iter()
                            .map(|item| match item {
                                Bson::Document(nested) => {
                                    Document::from_record(embedded, nested).map(Value::from)
                                }
                                other => Ok(Value::from_bson(other)),
                            })
                            .collect::<DocumentStoreResult<Vec<_>>>()?,
                    ),
                    _ => Value::from_bson(Bson::Array(items)),
                },
                (_, other) => Value::from_bson(other),
            };

            document.values.insert(key, value);
        }

        Ok(document)
    }

    /// Rehydrates many records, preserving their order.
    ///
    /// # Errors
    ///
    /// Fails on the first record that fails to rehydrate.
    pub fn from_records(
        model: &Arc<Model>,
        records: impl IntoIterator<Item = Record>,
    ) -> DocumentStoreResult<Vec<Self>> {
        records
            .into_iter()
            .map(|record| Document::from_record(model, record))
            .collect()
    }
}

fn canonicalize_timestamp(value: &mut Value) {
    if value.is_null() {
        return;
    }

    if let Some(timestamp) = parse_timestamp(value)
        .and_then(|timestamp| DateTime::from_timestamp_millis(timestamp.timestamp_millis()))
    {
        *value = Value::Timestamp(timestamp);
    }
}

fn canonicalize_embedded(value: &mut Value) {
    match value {
        Value::Document(document) if document.is_embedded() => document.canonicalize(),
        Value::Array(items) => items
            .iter_mut()
            .for_each(canonicalize_embedded),
        _ => {}
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.id == other.id && self.values == other.values
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .fields()
            .collect::<Vec<_>>();

        f.debug_struct("Document")
            .field("model", &self.model.name())
            .field("id", &self.id)
            .field("state", &self.state)
            .field("fields", &fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bson::{doc, oid::ObjectId};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::schema::FieldDescriptor;

    fn address() -> Arc<Model> {
        Model::embedded("address")
            .field("city", FieldType::Text)
            .field("moved_in", FieldType::Timestamp)
            .build()
            .unwrap()
    }

    fn person(address: &Arc<Model>) -> Arc<Model> {
        Model::document("people")
            .field("name", FieldDescriptor::new(FieldType::Text).default("anonymous"))
            .field("password", FieldDescriptor::new(FieldType::Text).private())
            .field("born", FieldType::Timestamp)
            .field("tags", FieldType::array_of(FieldType::Text))
            .field("home", FieldType::embedded(address))
            .field("previous", FieldType::array_of(FieldType::embedded(address)))
            .field("friend", FieldType::reference("people"))
            .build()
            .unwrap()
    }

    #[test]
    fn new_documents_carry_defaults() {
        let model = person(&address());
        let document = Document::new(&model);

        assert_eq!(document.get("name"), Some(&Value::from("anonymous")));
        assert_eq!(document.get("tags"), Some(&Value::Array(vec![])));
        assert_eq!(document.get("born"), Some(&Value::Null));
        assert_eq!(document.id(), None);
        assert_eq!(document.state(), LifecycleState::Unsaved);
    }

    #[test]
    fn producer_defaults_run_per_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let model = Model::document("events")
            .field(
                "at",
                FieldDescriptor::new(FieldType::Timestamp).default_with(move || {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Value::Timestamp(Utc::now())
                }),
            )
            .build()
            .unwrap();

        Document::new(&model);
        Document::new(&model);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_rejects_unknown_fields_without_setter() {
        let model = person(&address());
        let mut document = Document::new(&model);

        assert!(document.set("name", "alice").is_ok());
        assert!(matches!(
            document.set("nickname", "al"),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn virtual_setters_handle_unknown_keys() {
        let model = Model::document("people")
            .field("first", FieldType::Text)
            .field("last", FieldType::Text)
            .virtual_setter("full_name", |document, value| {
                let full = value.as_str().unwrap_or_default().to_string();
                let mut parts = full.splitn(2, ' ');

                document.set("first", parts.next().unwrap_or_default())?;
                document.set("last", parts.next().unwrap_or_default())
            })
            .build()
            .unwrap();

        let document = Document::from_record(&model, doc! { "full_name": "Ada Lovelace" }).unwrap();

        assert_eq!(document.get("first"), Some(&Value::from("Ada")));
        assert_eq!(document.get("last"), Some(&Value::from("Lovelace")));
    }

    #[test]
    fn canonicalize_normalizes_date_like_values() {
        let model = person(&address());
        let mut document = Document::new(&model);
        let mut home = Document::new(&address());

        home.set("moved_in", "2020-06-01").unwrap();
        document.set("born", 1_000_000_000_123_i64).unwrap();
        document.set("home", home).unwrap();
        document.canonicalize();

        let born = Utc.timestamp_millis_opt(1_000_000_000_123).unwrap();
        let moved_in = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(document.get("born"), Some(&Value::Timestamp(born)));
        assert_eq!(
            document
                .get("home")
                .and_then(Value::as_document)
                .and_then(|home| home.get("moved_in")),
            Some(&Value::Timestamp(moved_in))
        );

        let once = document.clone();
        document.canonicalize();

        assert_eq!(document, once);
    }

    #[test]
    fn canonicalize_truncates_to_milliseconds() {
        let model = person(&address());
        let mut document = Document::new(&model);
        let precise = Utc.timestamp_nanos(1_700_000_000_123_456_789);

        document.set("born", precise).unwrap();
        document.canonicalize();

        assert_eq!(
            document.get("born"),
            Some(&Value::Timestamp(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()))
        );
    }

    #[test]
    fn storage_form_nests_embedded_and_reduces_references() {
        let address = address();
        let model = person(&address);
        let mut friend = Document::new(&model);
        let friend_id = Identity::ObjectId(ObjectId::new());
        friend.set_id(friend_id.clone());

        let mut home = Document::new(&address);
        home.set("city", "Paris").unwrap();

        let mut document = Document::new(&model);
        document.set("home", home).unwrap();
        document.set("friend", friend).unwrap();
        document.set_id(Identity::ObjectId(ObjectId::new()));

        let record = document.to_storage_form(false);

        assert!(!record.contains_key("_id"));
        assert_eq!(record.get("friend"), Some(&friend_id.to_bson()));
        assert_eq!(
            record
                .get_document("home")
                .unwrap()
                .get_str("city")
                .unwrap(),
            "Paris"
        );
        assert!(
            document
                .to_storage_form(true)
                .contains_key("_id")
        );
    }

    #[test]
    fn storage_round_trip_preserves_fields() {
        let address = address();
        let model = person(&address);
        let mut home = Document::new(&address);
        home.set("city", "Lyon").unwrap();
        let mut old = Document::new(&address);
        old.set("city", "Nice").unwrap();

        let mut document = Document::new(&model);
        document.set("name", "bob").unwrap();
        document.set("tags", vec!["a", "b"]).unwrap();
        document.set("home", home).unwrap();
        document
            .set("previous", vec![Value::from(old)])
            .unwrap();
        document.set_id(Identity::ObjectId(ObjectId::new()));

        let restored = Document::from_record(&model, document.to_storage_form(true)).unwrap();

        assert_eq!(restored, document);
        assert_eq!(restored.state(), LifecycleState::Persisted);
        assert!(
            restored
                .get("previous")
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(Value::as_document)
                .is_some_and(Document::is_embedded)
        );
    }

    #[test]
    fn wire_form_hides_private_fields() {
        let model = person(&address());
        let mut document = Document::new(&model);
        let id = ObjectId::new();

        document.set("password", "hunter2").unwrap();
        document.set_id(Identity::ObjectId(id));

        let wire = document.to_wire_form();

        assert_eq!(wire["_id"], json!(id.to_hex()));
        assert_eq!(wire["name"], json!("anonymous"));
        assert!(wire.get("password").is_none());
    }

    #[test]
    fn from_records_preserves_order() {
        let model = person(&address());
        let documents = Document::from_records(
            &model,
            vec![doc! { "name": "a" }, doc! { "name": "b" }, doc! { "name": "c" }],
        )
        .unwrap();

        let names = documents
            .iter()
            .filter_map(|document| document.get("name").and_then(Value::as_str))
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn storage_round_trip_is_exact_once_canonicalized() {
        let model = person(&address());
        let born = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();

        let mut document = Document::new(&model);
        document.set("born", born).unwrap();

        let truncated = Document::from_record(&model, document.to_storage_form(false)).unwrap();
        assert_ne!(truncated, document);

        document.canonicalize();

        let restored = Document::from_record(&model, document.to_storage_form(false)).unwrap();
        assert_eq!(restored, document);
    }

    #[test]
    fn from_wire_str_builds_an_unsaved_document() {
        let model = person(&address());
        let payload = r#"{ "_id": "ignored", "name": "zoe", "home": { "city": "Lyon" } }"#;

        let document = Document::from_wire_str(&model, payload).unwrap();

        assert_eq!(document.id(), None);
        assert_eq!(document.state(), LifecycleState::Unsaved);
        assert_eq!(document.get("name"), Some(&Value::from("zoe")));
        assert!(
            document
                .get("home")
                .and_then(Value::as_document)
                .is_some_and(|home| home.is_embedded() && home.get("city") == Some(&Value::from("Lyon")))
        );
    }

    #[test]
    fn from_wire_str_rejects_bad_payloads() {
        let model = person(&address());

        assert!(matches!(
            Document::from_wire_str(&model, "{ not json"),
            Err(DocumentStoreError::Serialization(_))
        ));
        assert!(matches!(
            Document::from_wire_str(&model, "[1, 2]"),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }
}
