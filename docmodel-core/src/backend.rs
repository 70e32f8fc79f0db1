//! The storage collaborator contract.
//!
//! The engine never talks to a database directly. Everything it needs from storage goes
//! through [`StoreBackend`]: writing a record under an identity, reading records back by
//! [`Query`], deleting, counting and indexing. A backend also declares which identity type
//! it generates natively, which decides how bare references are recognized.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the contract itself, implemented by each backend
//! - [`DynStoreBackend`]: an object-safe mirror, implemented for every [`StoreBackend`]
//! - [`StoreBackendBuilder`]: asynchronous construction of a backend
//!
//! # Example
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = InMemoryStore::new();
//! let id = backend.upsert("users", None, doc! { "name": "Alice" }).await?;
//! let found = backend.find_one("users", Query::by_id(&id)).await?;
//! ```

use std::{any::Any, fmt::Debug};

use async_trait::async_trait;

use crate::{
    error::DocumentStoreResult,
    query::Query,
    value::{Identity, IdentityKind, Value},
};

/// A stored record, as handed to and returned by a backend.
pub type Record = bson::Document;

/// Options for [`StoreBackend::create_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexOptions {
    /// Reject a second record with the same value.
    pub unique: bool,
    /// Skip records where the field is missing or null.
    pub sparse: bool,
}

/// Abstract interface for document storage backends.
///
/// Implementations must be safe to share between tasks. Collection names are the model
/// names, and a collection springs into existence on first write.
///
/// # Errors
///
/// Every method returns a [`DocumentStoreResult`]. The engine propagates backend errors to
/// its callers unchanged, so implementations should pick the most specific
/// [`DocumentStoreError`](crate::error::DocumentStoreError) variant available, such as
/// `UniqueViolation` for index conflicts.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts or replaces a record.
    ///
    /// With no identity the backend generates one of its native kind and inserts. With an
    /// identity the record stored under it is replaced, or inserted if absent.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to write to
    /// * `id` - The identity of the record to replace, if any
    /// * `record` - The record, without an `_id` key
    ///
    /// # Returns
    ///
    /// The identity the record is stored under.
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        record: Record,
    ) -> DocumentStoreResult<Identity>;

    /// Deletes the record with the given identity, returning how many were removed.
    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64>;

    /// Deletes the first record matching `query`, returning how many were removed.
    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;

    /// Deletes every record matching `query`, returning how many were removed.
    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;

    /// Returns the first record matching `query`, honoring its sort and skip.
    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>>;

    /// Returns every record matching `query`, honoring its sort, skip and limit.
    ///
    /// Returned records carry their identity under `_id`.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>>;

    /// Counts the records matching `query`.
    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;

    /// Creates an index on `field`.
    ///
    /// Creating an index that already exists is not an error.
    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()>;

    /// Removes every record from a collection, returning how many were removed.
    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64>;

    /// Drops every collection.
    ///
    /// # Warning
    ///
    /// This permanently deletes all data held by the backend.
    async fn drop_all(&self) -> DocumentStoreResult<()>;

    /// The identity type this backend generates.
    fn native_identity_kind(&self) -> IdentityKind;

    /// Returns true if `value` is a bare identity native to this backend.
    fn is_native_identity(&self, value: &Value) -> bool {
        self.native_identity_kind().is_native(value)
    }

    /// Converts `value` to a native identity, if it holds one.
    fn to_canonical_identity(&self, value: &Value) -> Option<Identity> {
        self.native_identity_kind().parse(value)
    }

    /// Releases the backend's resources.
    ///
    /// The default implementation does nothing.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`], used behind `Box<dyn DynStoreBackend>`.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        record: Record,
    ) -> DocumentStoreResult<Identity>;
    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64>;
    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;
    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;
    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>>;
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>>;
    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64>;
    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()>;
    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64>;
    async fn drop_all(&self) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn native_identity_kind(&self) -> IdentityKind;
    fn is_native_identity(&self, value: &Value) -> bool;
    fn to_canonical_identity(&self, value: &Value) -> Option<Identity>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn upsert(
        &self,
        collection: &str,
        id: Option<&Identity>,
        record: Record,
    ) -> DocumentStoreResult<Identity> {
        StoreBackend::upsert(self, collection, id, record).await
    }

    async fn delete_by_id(&self, collection: &str, id: &Identity) -> DocumentStoreResult<u64> {
        StoreBackend::delete_by_id(self, collection, id).await
    }

    async fn delete_one(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        StoreBackend::delete_one(self, collection, query).await
    }

    async fn delete_many(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        StoreBackend::delete_many(self, collection, query).await
    }

    async fn find_one(&self, collection: &str, query: Query) -> DocumentStoreResult<Option<Record>> {
        StoreBackend::find_one(self, collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Record>> {
        StoreBackend::find(self, collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> DocumentStoreResult<u64> {
        StoreBackend::count(self, collection, query).await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        StoreBackend::create_index(self, collection, field, options).await
    }

    async fn clear_collection(&self, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::clear_collection(self, collection).await
    }

    async fn drop_all(&self) -> DocumentStoreResult<()> {
        StoreBackend::drop_all(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn native_identity_kind(&self) -> IdentityKind {
        StoreBackend::native_identity_kind(self)
    }

    fn is_native_identity(&self, value: &Value) -> bool {
        StoreBackend::is_native_identity(self, value)
    }

    fn to_canonical_identity(&self, value: &Value) -> Option<Identity> {
        StoreBackend::to_canonical_identity(self, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Builds a backend, typically after connecting to a server.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
