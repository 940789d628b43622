//! In-memory storage implementation for document stores.
//!
//! Documents are kept per index and type name as BSON bodies, together with a
//! version counter and an insertion sequence number, behind an async-aware
//! read-write lock.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    request::{
        DocumentTarget, Hit, IndexRequest, MultiGetRequest, SearchRequest, SearchResponse,
        UpdateRequest, WriteResponse,
    },
};

use crate::evaluator::{self, DocumentEvaluator};

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Position in insertion order; unsorted searches return documents in this order.
    seq: u64,
    version: i64,
    source: BsonDocument,
}

impl StoredDocument {
    fn hit(&self, id: &str) -> Hit {
        Hit {
            id: id.to_string(),
            version: Some(self.version),
            source: self.source.clone(),
        }
    }
}

type CollectionMap = HashMap<String, StoredDocument>;

#[derive(Debug, Default)]
struct StoreState {
    /// (index, type name) -> (document id -> document)
    collections: HashMap<(String, String), CollectionMap>,
    next_seq: u64,
}

impl StoreState {
    fn collection(&self, index: &str, doc_type: &str) -> Option<&CollectionMap> {
        self.collections
            .get(&(index.to_string(), doc_type.to_string()))
    }

    fn collection_mut(&mut self, index: &str, doc_type: &str) -> Option<&mut CollectionMap> {
        self.collections
            .get_mut(&(index.to_string(), doc_type.to_string()))
    }
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Every write bumps the document's version, starting at 1. Updates that carry a
/// version are rejected with [`DocumentStoreError::VersionConflict`] when the stored
/// version differs.
///
/// # Performance
///
/// Searches scan every document of the addressed index (no indexing).
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use docmodel::request::IndexRequest;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let written = store
///     .index_document(IndexRequest {
///         index: "users".into(),
///         doc_type: "users".into(),
///         id: None,
///         body: doc! { "name": "Alice" },
///     })
///     .await?;
///
/// assert_eq!(written.version, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmodel_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of documents stored under an index and type name.
    pub async fn document_count(&self, index: &str, doc_type: &str) -> usize {
        self.state
            .read()
            .await
            .collection(index, doc_type)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn index_document(&self, request: IndexRequest) -> DocumentStoreResult<WriteResponse> {
        let mut state = self.state.write().await;
        let seq = state.next_seq;
        let collection = state
            .collections
            .entry((request.index, request.doc_type))
            .or_default();

        let id = request.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let version = match collection.get_mut(&id) {
            Some(existing) => {
                existing.version += 1;
                existing.source = request.body;
                existing.version
            }
            None => {
                collection.insert(
                    id.clone(),
                    StoredDocument {
                        seq,
                        version: 1,
                        source: request.body,
                    },
                );
                1
            }
        };

        state.next_seq += 1;

        Ok(WriteResponse { id, version })
    }

    async fn update_document(&self, request: UpdateRequest) -> DocumentStoreResult<WriteResponse> {
        let UpdateRequest {
            target,
            version,
            doc,
        } = request;

        let mut state = self.state.write().await;
        let not_found = || DocumentStoreError::DocumentNotFound(target.id.clone(), target.index.clone());

        let stored = state
            .collection_mut(&target.index, &target.doc_type)
            .and_then(|collection| collection.get_mut(&target.id))
            .ok_or_else(not_found)?;

        if let Some(expected) = version {
            if expected != stored.version {
                return Err(DocumentStoreError::VersionConflict {
                    id: target.id.clone(),
                    expected,
                    actual: stored.version,
                });
            }
        }

        evaluator::merge(&mut stored.source, doc);
        stored.version += 1;

        Ok(WriteResponse {
            id: target.id.clone(),
            version: stored.version,
        })
    }

    async fn delete_document(&self, target: DocumentTarget) -> DocumentStoreResult<()> {
        let mut state = self.state.write().await;

        state
            .collection_mut(&target.index, &target.doc_type)
            .and_then(|collection| collection.remove(&target.id))
            .map(|_| ())
            .ok_or(DocumentStoreError::DocumentNotFound(target.id, target.index))
    }

    async fn multi_get(&self, request: MultiGetRequest) -> DocumentStoreResult<Vec<Hit>> {
        let state = self.state.read().await;
        let Some(collection) = state.collection(&request.index, &request.doc_type) else {
            return Ok(Vec::new());
        };

        Ok(request
            .ids
            .iter()
            .filter_map(|id| collection.get(id).map(|stored| stored.hit(id)))
            .collect())
    }

    async fn search(&self, request: SearchRequest) -> DocumentStoreResult<SearchResponse> {
        let state = self.state.read().await;
        let Some(collection) = state.collection(&request.index, &request.doc_type) else {
            return Ok(SearchResponse::default());
        };

        let mut matched = collection
            .iter()
            .filter(|(id, stored)| DocumentEvaluator::new(id, &stored.source).matches(&request.filter))
            .collect::<Vec<_>>();

        matched.sort_by_key(|(_, stored)| stored.seq);

        if !request.sort.is_empty() {
            matched.sort_by(|(left_id, left), (right_id, right)| {
                evaluator::compare(
                    &DocumentEvaluator::new(left_id, &left.source),
                    &DocumentEvaluator::new(right_id, &right.source),
                    &request.sort,
                )
            });
        }

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(usize::try_from(request.from).unwrap_or(usize::MAX))
            .take(usize::try_from(request.size).unwrap_or(usize::MAX))
            .map(|(id, stored)| {
                let mut hit = stored.hit(id);
                if let Some(fields) = &request.fields {
                    hit.source = evaluator::project(&stored.source, fields);
                }
                hit
            })
            .collect();

        Ok(SearchResponse { total, hits })
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
