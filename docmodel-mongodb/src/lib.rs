//! MongoDB backend for docmodel.
//!
//! This crate provides a MongoDB implementation of the `StoreBackend` trait, persisting
//! documents with the server's own query engine doing the filtering and sorting.
//! `mongodb://` and `mongodb+srv://` connection strings resolve to it when the facade's
//! `mongodb` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **ObjectId identities** - New records get server-style `ObjectId`s
//! - **Native queries** - Filters translate to MongoDB query documents
//! - **Unique indexes** - Duplicate key errors surface as `UniqueViolation`
//! - **Key escaping** - Object keys containing `.` or `$` round-trip safely
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::from_url("mongodb://localhost:27017/blog")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod query;
mod sanitizer;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
