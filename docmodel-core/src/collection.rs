//! Model-bound collections.
//!
//! A [`ModelCollection`] pairs a top-level model with a [`Database`] and offers the
//! collection-wide operations: creating instances, loading them (optionally populated),
//! counting, bulk deletion and index setup. Per-document operations live on [`Document`]
//! itself ([`save`](Document::save), [`delete`](Document::delete)).
//!
//! # Example
//!
//! ```ignore
//! let posts = db.collection(&posts_model)?;
//!
//! let popular = posts
//!     .find(Filter::gte("score", 100).into(), Populate::Fields(vec!["author".into()]))
//!     .await?;
//! ```

use std::sync::Arc;

use crate::{
    backend::{IndexOptions, Record},
    database::Database,
    document::Document,
    error::DocumentStoreResult,
    model::Model,
    query::Query,
    value::Identity,
};

/// Which reference fields to populate when loading documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Populate {
    /// Leave references as bare identities.
    None,
    /// Populate every reference field.
    #[default]
    All,
    /// Populate only the listed fields.
    Fields(Vec<String>),
}

/// The collection of a top-level model.
#[derive(Debug, Clone)]
pub struct ModelCollection<'a> {
    model: Arc<Model>,
    db: &'a Database,
}

impl<'a> ModelCollection<'a> {
    pub(crate) fn new(model: Arc<Model>, db: &'a Database) -> Self {
        Self { model, db }
    }

    /// The collection name, which is the model name.
    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Creates an unsaved instance with every field defaulted, then applies `values`.
    ///
    /// Keys outside the schema go through the model's virtual setters, or are ignored.
    ///
    /// # Errors
    ///
    /// Errors from a virtual setter are returned unchanged.
    pub fn create(&self, values: Option<Record>) -> DocumentStoreResult<Document> {
        match values {
            Some(record) => Document::from_record(&self.model, record),
            None => Ok(Document::new(&self.model)),
        }
    }

    /// Loads the first document matching `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - Filter, sort and skip to apply
    /// * `populate` - Which reference fields to resolve on the loaded document
    ///
    /// # Errors
    ///
    /// Returns any backend error, or an error from population or rehydration.
    pub async fn find_one(
        &self,
        query: Query,
        populate: Populate,
    ) -> DocumentStoreResult<Option<Document>> {
        let Some(record) = self
            .db
            .backend()
            .find_one(self.name(), query)
            .await?
        else {
            return Ok(None);
        };

        let mut documents = vec![Document::from_record(&self.model, record)?];
        self.populate(&mut documents, populate)
            .await?;

        Ok(documents.pop())
    }

    /// Loads the document with the given identity.
    pub async fn find_by_id(
        &self,
        id: &Identity,
        populate: Populate,
    ) -> DocumentStoreResult<Option<Document>> {
        self.find_one(Query::by_id(id), populate)
            .await
    }

    /// Loads every document matching `query`, in the order the backend returns them.
    ///
    /// # Errors
    ///
    /// Returns any backend error, or an error from population or rehydration.
    pub async fn find(&self, query: Query, populate: Populate) -> DocumentStoreResult<Vec<Document>> {
        let records = self
            .db
            .backend()
            .find(self.name(), query)
            .await?;

        let mut documents = Document::from_records(&self.model, records)?;
        self.populate(&mut documents, populate)
            .await?;

        Ok(documents)
    }

    /// Counts the documents matching `query`.
    pub async fn count(&self, query: Query) -> DocumentStoreResult<u64> {
        self.db
            .backend()
            .count(self.name(), query)
            .await
    }

    /// Deletes the first document matching `query` without running hooks.
    ///
    /// # Returns
    ///
    /// The number of records removed, `0` or `1`.
    pub async fn delete_one(&self, query: Query) -> DocumentStoreResult<u64> {
        self.db
            .backend()
            .delete_one(self.name(), query)
            .await
    }

    /// Deletes every document matching `query` without running hooks.
    pub async fn delete_many(&self, query: Query) -> DocumentStoreResult<u64> {
        self.db
            .backend()
            .delete_many(self.name(), query)
            .await
    }

    /// Removes every document from the collection.
    pub async fn clear(&self) -> DocumentStoreResult<u64> {
        log::debug!("clearing collection {}", self.name());

        self.db
            .backend()
            .clear_collection(self.name())
            .await
    }

    /// Creates a unique index for every field declared `unique`.
    ///
    /// Indexes on optional fields are sparse, so several documents may leave the field unset.
    pub async fn ensure_indexes(&self) -> DocumentStoreResult<()> {
        for (field, descriptor) in self.model.schema().fields() {
            if !descriptor.unique {
                continue;
            }

            self.db
                .backend()
                .create_index(
                    self.name(),
                    field,
                    IndexOptions {
                        unique: true,
                        sparse: !descriptor.required,
                    },
                )
                .await?;
        }

        Ok(())
    }

    async fn populate(&self, documents: &mut [Document], populate: Populate) -> DocumentStoreResult<()> {
        match populate {
            Populate::None => Ok(()),
            Populate::All => self.db.populate(documents, None).await,
            Populate::Fields(fields) => {
                let fields = fields
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>();

                self.db
                    .populate(documents, Some(&fields))
                    .await
            }
        }
    }
}
