//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{DynStoreBackend, IndexOptions, Record, StoreBackend, StoreBackendBuilder},
    collection::{ModelCollection, Populate},
    database::Database,
    document::{Document, LifecycleState},
    error::{DocumentStoreError, DocumentStoreResult, ValidationError, ValidationErrorKind},
    hooks::Hooks,
    model::{Model, ModelBuilder, ModelKind},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    schema::{DefaultValue, FieldDeclaration, FieldDescriptor, Schema, Validator},
    types::FieldType,
    value::{Identity, IdentityKind, Value},
};
pub use docmodel_memory::InMemoryStore;
