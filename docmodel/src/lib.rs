//! Schema-first document models over pluggable document stores.
//!
//! This crate is the entry point of the docmodel workspace. It re-exports the engine from
//! `docmodel-core`, the backends, and [`connect`], which picks a backend from a connection
//! string.
//!
//! A model is declared at runtime: a name, an ordered list of fields each with a type and
//! constraints, optional lifecycle hooks and virtual setters. Documents are instances of a
//! model. Saving one runs its hooks, validates and canonicalizes it, and writes a storage
//! record; loading one can resolve its reference fields in a single batched query per
//! field.
//!
//! # Features
//!
//! - **Declarative schemas** - Fields declared as types, descriptors or JSON
//! - **Validation** - Type, required, pattern, choices, bounds and custom checks
//! - **Lifecycle hooks** - Around validation, save and delete, fanned out to embedded documents
//! - **Embedded documents** - Stored inline, validated and hooked with their parent
//! - **Reference population** - One query per reference field, whatever the batch size
//! - **Multiple backends** - In-memory, and MongoDB behind the `mongodb` feature
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let users = Model::document("users")
//!         .field("name", FieldDescriptor::new(FieldType::Text).required())
//!         .build()?;
//!
//!     let posts = Model::document("posts")
//!         .field("title", FieldType::Text)
//!         .field("author", FieldType::reference("users"))
//!         .build()?;
//!
//!     let mut db = docmodel::connect("memory://").await?;
//!     db.register(&users).register(&posts);
//!
//!     let mut alice = db.collection(&users)?.create(None)?;
//!     alice.set("name", "Alice")?;
//!     alice.save(&db).await?;
//!
//!     let mut post = db.collection(&posts)?.create(None)?;
//!     post.set("title", "Hello")?;
//!     post.set("author", alice.clone())?;
//!     post.save(&db).await?;
//!
//!     let loaded = db
//!         .collection(&posts)?
//!         .find(Query::new(), Populate::All)
//!         .await?;
//!
//!     println!("{}", loaded[0].to_wire_form());
//!
//!     db.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires the `mongodb` feature)

mod connect;
pub mod prelude;

pub use connect::connect;
pub use docmodel_core::{
    backend, collection, database, document, error, hooks, model, populate, query, schema,
    types, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
