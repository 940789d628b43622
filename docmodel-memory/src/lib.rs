//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Match filters** - Equality on top-level and dotted fields, array containment
//! - **Sorting, pagination and projection** - Multi-key sort maps, `from`/`size`, field lists
//! - **Versioning** - Per-document versions with version-checked partial updates
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.register("User", Schema::new().field("name", FieldSpec::string()))?;
//!
//!     let alice = users.create(doc! { "name": "Alice" }).await?;
//!     assert_eq!(alice.version(), Some(1));
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
