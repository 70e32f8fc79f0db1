//! A schema-first document modeling layer over pluggable document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Values and identities** ([`value`]) - The dynamic field value and document identities
//! - **Field types** ([`types`]) - The type vocabulary and structural type checks
//! - **Schemas** ([`schema`]) - Field descriptors and declaration normalization
//! - **Models** ([`model`]) - Named schemas with hooks and virtual setters
//! - **Documents** ([`document`]) - Instances, canonicalization and storage/wire projections
//! - **Validation** ([`validate`]) - Constraint checking in declaration order
//! - **Lifecycle** ([`lifecycle`], [`hooks`]) - Save and delete with hook sequencing
//! - **Population** ([`populate`]) - Batched one-hop reference resolution
//! - **Storage contract** ([`backend`], [`query`]) - The interface backends implement
//! - **Database and collections** ([`database`], [`collection`]) - The handle every operation runs against
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{database::Database, model::Model, types::FieldType};
//! use serde_json::json;
//!
//! let users = Model::document("users")
//!     .field("name", json!({ "type": "text", "required": true }))
//!     .field("age", FieldType::Number)
//!     .build()?;
//!
//! let mut db = Database::new(backend);
//! db.register(&users);
//!
//! let mut alice = db.collection(&users)?.create(None)?;
//! alice.set("name", "Alice")?;
//! alice.save(&db).await?;
//! ```

pub mod backend;
pub mod collection;
pub mod database;
pub mod document;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod model;
pub mod populate;
pub mod query;
pub mod schema;
pub mod types;
pub mod validate;
pub mod value;
