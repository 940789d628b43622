//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Schemas, field specifications and virtuals
//! - The document store, models and their configuration
//! - Documents, live containers and values
//! - Queries, result collections and deferred commands
//! - Backend traits and error types

pub use bson::doc;

pub use docmodel_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    deferred::{Command, Deferrable, Deferred},
    document::Document,
    error::{
        DocumentStoreError, DocumentStoreResult, ModelError, ModelResult, RangeBound,
        ValidationError, ValidationErrorKind,
    },
    live::{LiveArray, LiveObject},
    model::{Model, ModelConfig, ModelConfigBuilder, UpdateOptions},
    path::FieldPath,
    query::{Query, QueryOutput, Sort, SortDirection},
    results::Results,
    schema::{FieldSpec, Schema, TypeToken, Virtual},
    store::DocumentStore,
    value::Value,
};
