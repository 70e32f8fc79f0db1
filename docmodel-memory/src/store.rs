//! In-memory storage backend.
//!
//! Records live in insertion order inside per-collection vectors guarded by an async-aware
//! read-write lock. Queries scan the collection; unique indexes are checked on every write.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::Bson;
use mea::rwlock::RwLock;

use docmodel_core::{
    backend::{IndexOptions, Record, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, SortDirection},
    value::{Identity, IdentityKind},
};

use crate::evaluator::{Comparable, RecordEvaluator, lookup};

static NULL: Bson = Bson::Null;

/// Records and indexes of one collection.
#[derive(Debug, Default)]
struct CollectionData {
    records: Vec<Record>,
    indexes: Vec<(String, IndexOptions)>,
}

impl CollectionData {
    fn position(&self, id: &Bson) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.get("_id") == Some(id))
    }

    /// Returns the first unique field `record` would duplicate, ignoring the record at `skip`.
    fn unique_conflict(&self, record: &Record, skip: Option<usize>) -> Option<&str> {
        self.indexes
            .iter()
            .filter(|(_, options)| options.unique)
            .find(|(field, options)| {
                let value = match lookup(record, field) {
                    Some(Bson::Null) | None if options.sparse => return false,
                    Some(value) => value,
                    None => &NULL,
                };

                self.records
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| Some(*index) != skip)
                    .any(|(_, other)| {
                        let existing = lookup(other, field).unwrap_or(&NULL);
                        Comparable::from(existing) == Comparable::from(value)
                    })
            })
            .map(|(field, _)| field.as_str())
    }

    /// Applies filter, sort, skip and limit, returning the indexes of matching records.
    fn select(&self, query: &Query) -> Vec<usize> {
        let mut selected = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|filter| RecordEvaluator::matches(record, filter))
            })
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if let Some(sort) = &query.sort {
            selected.sort_by(|a, b| {
                let left = lookup(&self.records[*a], &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup(&self.records[*b], &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            });
        }

        selected
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn remove_all(&mut self, mut indexes: Vec<usize>) -> u64 {
        indexes.sort_unstable();

        for index in indexes.iter().rev() {
            self.records.remove(*index);
        }

        indexes.len() as u64
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// Clones share the same data, so a clone can be handed to a [`Database`] while the
/// original is kept for inspection. Identities are UUIDs.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.upsert("users", None, doc! { "name": "Alice" }).await?;
/// assert_eq!(store.count("users", Query::new()).await?, 1);
/// ```
///
/// [`Database`]: docmodel_core::database::Database
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Lists the collections that hold at least one record or index.
    pub async fn collections(&self) -> Vec<String> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        mut record: Record,
    ) -> DocumentStoreResult<Identity> {
        let id = id
            .cloned()
            .unwrap_or_else(|| IdentityKind::Uuid.generate());
        let key = id.to_bson();

        record.remove("_id");

        let mut stored = Record::new();
        stored.insert("_id", key.clone());
        for (field, value) in record {
            stored.insert(field, value);
        }

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();
        let existing = data.position(&key);

        if let Some(field) = data.unique_conflict(&stored, existing) {
            return Err(DocumentStoreError::UniqueViolation(
                field.to_string(),
                collection.to_string(),
            ));
        }

        match existing {
            Some(index) => data.records[index] = stored,
            None => data.records.push(stored),
        }

        Ok(id)
    }

    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        match data.position(&id.to_bson()) {
            Some(index) => {
                data.records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        let query = Query {
            limit: Some(1),
            ..query
        };

        self.delete_many(collection, query)
            .await
    }

    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let selected = data.select(&query);

        Ok(data.remove_all(selected))
    }

    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>> {
        let query = Query {
            limit: Some(1),
            ..query
        };

        Ok(self
            .find(collection, query)
            .await?
            .into_iter()
            .next())
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>> {
        let store = self.store.read().await;

        let Some(data) = store.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(data
            .select(&query)
            .into_iter()
            .map(|index| data.records[index].clone())
            .collect())
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|data| data.select(&query).len() as u64)
            .unwrap_or(0))
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if data
            .indexes
            .iter()
            .any(|(existing, _)| existing == field)
        {
            return Ok(());
        }

        data.indexes
            .push((field.to_string(), options));

        log::debug!("created index on {collection}.{field} ({options:?})");

        Ok(())
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        Ok(store
            .get_mut(collection)
            .map(|data| std::mem::take(&mut data.records).len() as u64)
            .unwrap_or(0))
    }

    async fn drop_all(&self) -> DocumentStoreResult<()> {
        self.store.write().await.clear();

        Ok(())
    }

    fn native_identity_kind(&self) -> IdentityKind {
        IdentityKind::Uuid
    }
}

/// Builder for [`InMemoryStore`].
///
/// Takes no options; it exists so the memory backend can be built the same way as the
/// others.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docmodel_core::query::Filter;

    use super::*;

    #[tokio::test]
    async fn upsert_generates_uuid_identities() {
        let store = InMemoryStore::new();

        let id = store
            .upsert("users", None, doc! { "name": "alice" })
            .await
            .unwrap();

        assert_eq!(id.kind(), IdentityKind::Uuid);

        let found = store
            .find_one("users", Query::by_id(&id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.get_str("name").unwrap(), "alice");
        assert_eq!(found.get("_id"), Some(&id.to_bson()));
    }

    #[tokio::test]
    async fn upsert_with_identity_replaces() {
        let store = InMemoryStore::new();
        let id = store
            .upsert("users", None, doc! { "name": "alice" })
            .await
            .unwrap();

        let same = store
            .upsert("users", Some(&id), doc! { "name": "alicia" })
            .await
            .unwrap();

        assert_eq!(same, id);
        assert_eq!(store.count("users", Query::new()).await.unwrap(), 1);
        assert_eq!(
            store
                .find_one("users", Query::new())
                .await
                .unwrap()
                .unwrap()
                .get_str("name")
                .unwrap(),
            "alicia"
        );
    }

    #[tokio::test]
    async fn sorts_mixed_type_keys_without_panicking() {
        let store = InMemoryStore::new();

        for score in [Bson::Double(f64::NAN), "high".into(), Bson::Int32(7), Bson::Null, Bson::Double(0.5)] {
            store
                .upsert("scores", None, doc! { "score": score })
                .await
                .unwrap();
        }
        store
            .upsert("scores", None, doc! { "name": "unscored" })
            .await
            .unwrap();

        let sorted = store
            .find("scores", Query::builder().sort("score", SortDirection::Asc).build())
            .await
            .unwrap()
            .iter()
            .map(|record| record.get("score").cloned())
            .collect::<Vec<_>>();

        assert_eq!(sorted.len(), 6);
        assert_eq!(sorted[2], Some(Bson::Double(0.5)));
        assert_eq!(sorted[3], Some(Bson::Int32(7)));
        assert!(matches!(sorted[4], Some(Bson::Double(n)) if n.is_nan()));
        assert_eq!(sorted[5], Some(Bson::String("high".into())));
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let store = InMemoryStore::new();

        for score in [3, 1, 4, 1, 5] {
            store
                .upsert("scores", None, doc! { "score": score })
                .await
                .unwrap();
        }

        let query = Query::builder()
            .sort("score", SortDirection::Desc)
            .skip(1)
            .limit(2)
            .build();

        let scores = store
            .find("scores", query)
            .await
            .unwrap()
            .iter()
            .map(|record| record.get_i32("score").unwrap())
            .collect::<Vec<_>>();

        assert_eq!(scores, vec![4, 3]);
    }

    #[tokio::test]
    async fn deletes_report_counts() {
        let store = InMemoryStore::new();

        for n in 0..4 {
            store
                .upsert("numbers", None, doc! { "n": n, "even": n % 2 == 0 })
                .await
                .unwrap();
        }

        assert_eq!(
            store
                .delete_one("numbers", Filter::eq("even", true).into())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .delete_many("numbers", Filter::eq("even", false).into())
                .await
                .unwrap(),
            2
        );
        assert_eq!(store.clear_collection("numbers").await.unwrap(), 1);
        assert_eq!(
            store
                .delete_by_id("numbers", &IdentityKind::Uuid.generate())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn unique_indexes_reject_duplicates() {
        let store = InMemoryStore::new();

        store
            .create_index("users", "email", IndexOptions { unique: true, sparse: true })
            .await
            .unwrap();

        let id = store
            .upsert("users", None, doc! { "email": "a@example.com" })
            .await
            .unwrap();

        let err = store
            .upsert("users", None, doc! { "email": "a@example.com" })
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::UniqueViolation(ref field, _) if field == "email"));

        // Re-saving the same record is not a conflict, and sparse indexes skip nulls.
        store
            .upsert("users", Some(&id), doc! { "email": "a@example.com" })
            .await
            .unwrap();
        store
            .upsert("users", None, doc! { "email": null })
            .await
            .unwrap();
        store
            .upsert("users", None, doc! { "email": null })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drop_all_removes_every_collection() {
        let store = InMemoryStore::new();

        store
            .upsert("a", None, doc! {})
            .await
            .unwrap();
        store
            .upsert("b", None, doc! {})
            .await
            .unwrap();

        assert_eq!(store.collections().await, vec!["a", "b"]);

        store.drop_all().await.unwrap();

        assert!(store.collections().await.is_empty());
    }
}
