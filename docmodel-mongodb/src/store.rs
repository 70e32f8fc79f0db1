use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOneOptions, FindOptions, IndexOptions as MongoIndexOptions},
};
use docmodel_core::{
    backend::{IndexOptions, Record, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, Sort, SortDirection},
    value::{Identity, IdentityKind},
};

use crate::{query::MongoQueryTranslator, sanitizer::KeySanitizer};

const DUPLICATE_KEY: i32 = 11000;

/// A [`StoreBackend`] over a MongoDB database.
///
/// Records are keyed by `ObjectId`. Keys MongoDB cannot store are escaped on write and
/// restored on read.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Returns a builder connecting to `dsn` and using `database`.
    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Returns a builder connecting to `url`, using the database named in its path.
    pub fn from_url(url: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::from_url(url)
    }

    /// The name of the database this store writes to.
    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn sort_document(sort: &Sort) -> Document {
        doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        }
    }

    fn map_error(collection: &str, error: MongoError) -> DocumentStoreError {
        match error.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY => {
                DocumentStoreError::UniqueViolation(write_error.message.clone(), collection.to_string())
            }
            _ => DocumentStoreError::Backend(error.to_string()),
        }
    }

    /// Resolves the identities of the records a query selects, for deletions that must
    /// honor sort, skip or limit.
    async fn select_ids(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            StoreBackend::find(self, collection, query)
                .await?
                .into_iter()
                .filter_map(|mut record| record.remove("_id"))
                .collect()
        )
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        record: Record,
    ) -> DocumentStoreResult<Identity> {
        let mut record = KeySanitizer::sanitize(record);
        record.remove("_id");

        match id {
            Some(id) => {
                self.get_collection(collection)
                    .replace_one(doc! { "_id": id.to_bson() }, record)
                    .upsert(true)
                    .await
                    .map_err(|e| Self::map_error(collection, e))?;

                Ok(id.clone())
            }
            None => {
                let inserted = self.get_collection(collection)
                    .insert_one(record)
                    .await
                    .map_err(|e| Self::map_error(collection, e))?;

                Identity::from_bson(&inserted.inserted_id).ok_or_else(|| {
                    DocumentStoreError::Backend(format!(
                        "Unexpected identity {} returned for {collection}",
                        inserted.inserted_id
                    ))
                })
            }
        }
    }

    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(doc! { "_id": id.to_bson() })
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        if query.sort.is_none() && query.skip.is_none() {
            return Ok(
                self.get_collection(collection)
                    .delete_one(MongoQueryTranslator::filter(query.filter.as_ref())?)
                    .await
                    .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                    .deleted_count
            );
        }

        let ids = self.select_ids(collection, Query { limit: Some(1), ..query }).await?;

        match ids.into_iter().next() {
            Some(id) => Ok(
                self.get_collection(collection)
                    .delete_one(doc! { "_id": id })
                    .await
                    .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                    .deleted_count
            ),
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        let filter = if query.skip.is_none() && query.limit.is_none() {
            MongoQueryTranslator::filter(query.filter.as_ref())?
        } else {
            doc! { "_id": { "$in": self.select_ids(collection, query).await? } }
        };

        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>> {
        let mut options = FindOneOptions::default();

        if let Some(skip) = query.skip {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(Self::sort_document(sort));
        }

        Ok(
            self.get_collection(collection)
                .find_one(MongoQueryTranslator::filter(query.filter.as_ref())?)
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .map(KeySanitizer::restore)
        )
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.skip {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(Self::sort_document(sort));
        }

        Ok(
            self.get_collection(collection)
                .find(MongoQueryTranslator::filter(query.filter.as_ref())?)
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .into_iter()
                .map(KeySanitizer::restore)
                .collect()
        )
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(query.filter.as_ref())?)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(
                    MongoIndexOptions::builder()
                    .unique(options.unique)
                    .sparse(options.sparse)
                    .build()
                )
                .build()
            )
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(doc! {})
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn drop_all(&self) -> DocumentStoreResult<()> {
        log::info!("Dropping MongoDB database {}", self.database);

        self.client
            .database(&self.database)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    fn native_identity_kind(&self) -> IdentityKind {
        IdentityKind::ObjectId
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

/// Connects a [`MongoDbStore`].
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: Some(database.to_string()),
        }
    }

    /// Takes the database name from the path of `url`, as in
    /// `mongodb://localhost:27017/blog`.
    pub fn from_url(url: &str) -> Self {
        Self {
            dsn: url.to_string(),
            database: None,
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let database = self.database
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| DocumentStoreError::Initialization(
                format!("No database named in connection string {}", self.dsn)
            ))?;

        log::info!("Connecting to MongoDB database {database}");

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            database,
        ))
    }
}
