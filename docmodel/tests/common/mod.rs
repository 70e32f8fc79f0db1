#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use docmodel::{
    backend::{IndexOptions, Record, StoreBackend},
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    memory::InMemoryStore,
    model::Model,
    query::Query,
    types::FieldType,
    value::{Identity, IdentityKind},
};
use serde_json::json;

/// Counts the calls it forwards to an in-memory store.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    upserts: AtomicUsize,
    finds: AtomicUsize,
    deletes: AtomicUsize,
    failing_collection: Option<String>,
}

impl RecordingStore {
    /// A store whose `find` fails for `collection`.
    pub fn failing_finds_on(collection: &str) -> Self {
        Self {
            failing_collection: Some(collection.to_string()),
            ..Self::default()
        }
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.upserts.store(0, Ordering::SeqCst);
        self.finds.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for RecordingStore {
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        record: Record,
    ) -> DocumentStoreResult<Identity> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection, id, record).await
    }

    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_id(collection, id).await
    }

    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        self.inner.delete_one(collection, query).await
    }

    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        self.inner.delete_many(collection, query).await
    }

    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>> {
        self.inner.find_one(collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>> {
        self.finds.fetch_add(1, Ordering::SeqCst);

        if self.failing_collection.as_deref() == Some(collection) {
            return Err(DocumentStoreError::Backend(format!("{collection} is unavailable")));
        }

        self.inner.find(collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        self.inner.count(collection, query).await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        self.inner.create_index(collection, field, options).await
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64> {
        self.inner.clear_collection(collection).await
    }

    async fn drop_all(&self) -> DocumentStoreResult<()> {
        self.inner.drop_all().await
    }

    fn native_identity_kind(&self) -> IdentityKind {
        self.inner.native_identity_kind()
    }
}

/// A database over a fresh [`RecordingStore`].
pub fn recording_database() -> Database {
    Database::new(RecordingStore::default())
}

/// The recording store behind `db`.
pub fn recorder(db: &Database) -> &RecordingStore {
    db.backend()
        .as_any()
        .downcast_ref::<RecordingStore>()
        .expect("database is backed by a RecordingStore")
}

pub fn articles_model() -> Arc<Model> {
    Model::document("articles")
        .field("number", json!("number"))
        .field(
            "source",
            json!({ "type": "text", "required": true, "choices": ["reddit", "wired"] }),
        )
        .field("values", json!(["number"]))
        .build()
        .unwrap()
}

pub fn tags_model() -> Arc<Model> {
    Model::document("tags")
        .field("label", FieldType::Text)
        .build()
        .unwrap()
}

pub fn posts_model() -> Arc<Model> {
    Model::document("posts")
        .field("title", FieldType::Text)
        .field("tags", json!([{ "ref": "tags" }]))
        .field("featured", FieldType::reference("tags"))
        .build()
        .unwrap()
}
