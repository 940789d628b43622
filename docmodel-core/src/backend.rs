//! Storage backend abstraction for the modeling layer.
//!
//! This module defines the traits that abstract over search/storage engines, so the
//! same models can run against a remote cluster or the in-memory reference backend.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for the document
//! operations models are built on: indexing whole documents, merging partial updates
//! under a version check, deleting, fetching by identifier and searching.
//! Implementations are required to be thread-safe (`Send + Sync`) and support
//! concurrent access.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use docmodel::request::IndexRequest;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let written = backend
//!     .index_document(IndexRequest {
//!         index: "users".into(),
//!         doc_type: "users".into(),
//!         id: None,
//!         body: doc! { "name": "Alice", "age": 30 },
//!     })
//!     .await?;
//! assert_eq!(written.version, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use std::{any::Any, fmt::Debug};

use crate::{
    error::DocumentStoreResult,
    request::{
        DocumentTarget, Hit, IndexRequest, MultiGetRequest, SearchRequest, SearchResponse,
        UpdateRequest, WriteResponse,
    },
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The exact concurrency model is implementation-specific but should be
/// documented by the implementer.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// The modeling layer forwards these errors to callers unchanged.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Stores a whole document.
    ///
    /// A request without an identifier creates a new document under a backend-assigned
    /// identifier. A request with one replaces the stored document or creates it.
    ///
    /// # Returns
    ///
    /// The identifier and the new version of the stored document.
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse>;

    /// Merges the fields of `request.doc` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// when the target does not exist, and
    /// [`DocumentStoreError::VersionConflict`](crate::error::DocumentStoreError::VersionConflict)
    /// when `request.version` is set and differs from the stored version.
    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse>;

    /// Deletes a single document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// when the target does not exist.
    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()>;

    /// Fetches a single document, `None` when it does not exist.
    ///
    /// The default implementation issues a one-element [`multi_get`](Self::multi_get).
    async fn get_document(&self, target: DocumentTarget) -> DocumentStoreResult<Option<Hit>> {
        let hits = StoreBackend::multi_get(
            self,
            MultiGetRequest {
                index: target.index,
                doc_type: target.doc_type,
                ids: vec![target.id],
            },
        )
        .await?;

        Ok(hits.into_iter().next())
    }

    /// Fetches documents by identifier.
    ///
    /// Hits are returned in request order. Identifiers that do not exist are omitted.
    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>>;

    /// Runs a filtered search.
    ///
    /// # Returns
    ///
    /// The page of hits selected by `from`/`size` and the total number of matches.
    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse> {
        StoreBackend::index_document(*self, request).await
    }

    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse> {
        StoreBackend::update_document(*self, request).await
    }

    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()> {
        StoreBackend::delete_document(*self, target).await
    }

    async fn get_document(&self, target: DocumentTarget) -> DocumentStoreResult<Option<Hit>> {
        StoreBackend::get_document(*self, target).await
    }

    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>> {
        StoreBackend::multi_get(*self, request).await
    }

    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse> {
        StoreBackend::search(*self, request).await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse>;
    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse>;
    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()>;
    async fn get_document(&self, target: DocumentTarget) -> DocumentStoreResult<Option<Hit>>;
    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>>;
    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse> {
        StoreBackend::index_document(self, request).await
    }

    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse> {
        StoreBackend::update_document(self, request).await
    }

    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()> {
        StoreBackend::delete_document(self, target).await
    }

    async fn get_document(&self, target: DocumentTarget) -> DocumentStoreResult<Option<Hit>> {
        StoreBackend::get_document(self, target).await
    }

    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>> {
        StoreBackend::multi_get(self, request).await
    }

    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse> {
        StoreBackend::search(self, request).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
