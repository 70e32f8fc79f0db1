//! In-memory storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! suited to tests, examples and small embedded uses. It is what `memory://` connection
//! strings resolve to.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes behind an async-aware `RwLock`
//! - **UUID identities** - Records are keyed by freshly generated UUIDs
//! - **Full query support** - Filtering, dotted paths, sorting, skip and limit
//! - **Unique indexes** - Optional sparse unique constraints, checked on every write
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use docmodel_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let users = Model::document("users")
//!         .field("name", FieldType::Text)
//!         .build()?;
//!
//!     let mut db = Database::new(InMemoryStore::new());
//!     db.register(&users);
//!
//!     let mut alice = db.collection(&users)?.create(None)?;
//!     alice.set("name", "Alice")?;
//!     alice.save(&db).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
