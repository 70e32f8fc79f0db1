//! The database handle: a storage backend plus the registry of known models.
//!
//! Every lifecycle operation takes a `&Database` explicitly. There is no process-wide
//! connection; two databases over two backends can live side by side.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let mut db = Database::new(InMemoryStore::new());
//! db.register(&users).register(&posts);
//!
//! let mut post = db.collection(&posts)?.create(None)?;
//! post.set("title", "Hello")?;
//! post.save(&db).await?;
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::ModelCollection,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    populate::populate,
    value::IdentityKind,
};

/// A storage backend together with the models stored in it.
#[derive(Debug)]
pub struct Database {
    backend: Box<dyn DynStoreBackend>,
    models: HashMap<String, Arc<Model>>,
}

impl Database {
    /// Creates a database over `backend`, with no models registered.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    /// Creates a database over an already boxed backend.
    pub fn from_boxed(backend: Box<dyn DynStoreBackend>) -> Self {
        Self {
            backend,
            models: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &dyn DynStoreBackend {
        &*self.backend
    }

    /// The backend's native identity kind.
    pub fn identity_kind(&self) -> IdentityKind {
        self.backend.native_identity_kind()
    }

    /// Registers a model so reference fields naming it can be populated.
    ///
    /// Registering a second model under the same name replaces the first.
    pub fn register(&mut self, model: &Arc<Model>) -> &mut Self {
        self.models
            .insert(model.name().to_string(), Arc::clone(model));
        self
    }

    /// Looks up a registered model by name.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] if no model with that name was registered.
    pub fn model(&self, name: &str) -> DocumentStoreResult<&Arc<Model>> {
        self.models
            .get(name)
            .ok_or_else(|| DocumentStoreError::UnknownModel(name.to_string()))
    }

    /// Returns the collection of a top-level model.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for embedded models, which have no
    /// collection of their own.
    pub fn collection<'a>(&'a self, model: &Arc<Model>) -> DocumentStoreResult<ModelCollection<'a>> {
        if model.is_embedded() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "embedded model {} has no collection",
                model.name()
            )));
        }

        Ok(ModelCollection::new(Arc::clone(model), self))
    }

    /// Resolves reference fields of `documents` in place.
    ///
    /// See [`populate`](crate::populate::populate) for the details.
    pub async fn populate(
        &self,
        documents: &mut [Document],
        fields: Option<&[&str]>,
    ) -> DocumentStoreResult<()> {
        populate(self, documents, fields).await
    }

    /// Drops every collection in the backend.
    pub async fn drop_all(&self) -> DocumentStoreResult<()> {
        log::info!("dropping all collections");

        self.backend.drop_all().await
    }

    /// Shuts the backend down.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await
    }
}
