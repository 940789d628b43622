//! Main docmodel crate providing schema-driven document models.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! access to the bundled storage backend.
//!
//! # Features
//!
//! - **Typed schemas** - Coercion and validation of every assignment, with field paths in errors
//! - **Live containers** - Arrays and nested objects that keep validating on mutation
//! - **Change tracking** - Saves and updates send only what changed, guarded by versions
//! - **Queries and population** - Chainable finders, identifier lookups, reference resolution
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     let users = store.register(
//!         "User",
//!         Schema::new()
//!             .field("name", FieldSpec::string().required())
//!             .field("friends", FieldSpec::array_of(FieldSpec::string()).reference("User")),
//!     )?;
//!
//!     let bob = users.create(doc! { "name": "Bob" }).await?;
//!     let alice = users
//!         .create(doc! { "name": "Alice", "friends": [bob.id().unwrap_or_default()] })
//!         .await?;
//!
//!     let alice = users
//!         .find_by_id(alice.id().unwrap_or_default())
//!         .populate("friends")
//!         .exec()
//!         .await?
//!         .into_document();
//!
//!     println!("{:?}", alice.map(|alice| alice.to_bson()));
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use docmodel_core::{
    backend, deferred, document, error, live, model, path, query, request, results, schema,
    store, types, value,
};

// Re-export BSON and regex types for convenience
pub use bson;
pub use regex;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}
