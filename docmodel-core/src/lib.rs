//! Schema-driven document modeling on top of a search-engine style document store.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Schemas** ([`schema`]) - Declarative field specifications, virtuals, methods and statics
//! - **Type descriptors** ([`types`]) - Compiled field types and the coercion/validation pipeline
//! - **Live containers** ([`live`]) - Arrays and objects that validate on every mutation
//! - **Documents** ([`document`]) - Validated instances with change tracking and persistence
//! - **Models and the registry** ([`model`], [`store`]) - Named schemas bound to a backend
//! - **Queries** ([`query`]) - Chainable finders compiled to multi-gets or searches
//! - **Result collections** ([`results`]) - Bulk populate/save/update/remove
//! - **Deferred commands** ([`deferred`]) - Ordered replay of persistence commands
//! - **Store backend abstraction** ([`backend`], [`request`]) - Traits and wire types for backends
//! - **Error handling** ([`error`]) - Backend and modeling error types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{schema::{FieldSpec, Schema}, store::DocumentStore};
//! use bson::doc;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.register(
//!     "User",
//!     Schema::new()
//!         .field("name", FieldSpec::string().required())
//!         .field("age", FieldSpec::number().min(0.0)),
//! )?;
//!
//! let alice = users.create(doc! { "name": "Alice", "age": "30" }).await?;
//! let found = users.find_by_id(alice.id().unwrap_or_default()).exec().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod deferred;
pub mod document;
pub mod error;
pub mod live;
pub mod model;
pub mod path;
mod populate;
pub mod query;
pub mod request;
pub mod results;
pub mod schema;
pub mod store;
pub mod types;
pub mod value;
