//! Models: a schema registered under a name, bound to a document store.
//!
//! A [`Model`] is the entry point for creating documents and for the model-level
//! operations (`find`, `find_one`, `find_by_id`, `create`, `update`, `count` and
//! user-defined statics).

use bson::{Bson, Document as BsonDocument, doc};
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tracing::debug;

use crate::{
    document::Document,
    error::{ModelError, ModelResult},
    path::FieldPath,
    query::Query,
    results::Results,
    schema::Schema,
    store::{DocumentStore, StoreInner},
    types::ObjectShape,
    value::Value,
};

/// Number of hits a search returns when no limit is given.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Number of documents bulk operations and population work on at a time.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-model settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// The index documents are stored in.
    pub index: String,
    /// The type name documents are stored under.
    pub doc_type: String,
    /// Hits per search when the query sets no limit.
    pub page_size: u64,
    /// Concurrency of bulk result operations and population.
    pub concurrency: usize,
}

impl ModelConfig {
    /// Creates a builder whose index and type name default to `name`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = ModelConfig::builder("User")
    ///     .with_index("people")
    ///     .with_page_size(25)
    ///     .build();
    ///
    /// assert_eq!(config.doc_type, "User");
    /// ```
    pub fn builder(name: &str) -> ModelConfigBuilder {
        ModelConfigBuilder::new(name)
    }
}

/// Builder for constructing [`ModelConfig`] instances with fluent API.
#[derive(Debug, Clone)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: ModelConfig {
                index: name.to_string(),
                doc_type: name.to_string(),
                page_size: DEFAULT_PAGE_SIZE,
                concurrency: DEFAULT_CONCURRENCY,
            },
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.config.index = index.into();
        self
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.config.doc_type = doc_type.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Sets the concurrency of bulk operations. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}

/// Options for [`Model::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Create a document from the update data when nothing matches.
    pub upsert: bool,
    /// Update every match instead of the first one.
    pub multi: bool,
}

struct ModelInner {
    name: String,
    schema: Arc<Schema>,
    shape: Arc<ObjectShape>,
    config: ModelConfig,
    store: Weak<StoreInner>,
}

/// A named, registered schema.
///
/// Cloning is cheap; clones refer to the same model.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    pub(crate) fn new(
        name: &str,
        schema: Arc<Schema>,
        config: ModelConfig,
        store: Weak<StoreInner>,
    ) -> ModelResult<Self> {
        let shape = ObjectShape::compile(schema.fields(), &FieldPath::root())?;

        Ok(Self {
            inner: Arc::new(ModelInner {
                name: name.to_string(),
                schema,
                shape: Arc::new(shape),
                config,
                store,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    /// The compiled descriptors of this model's fields.
    pub fn shape(&self) -> &Arc<ObjectShape> {
        &self.inner.shape
    }

    /// Returns `true` if both handles refer to the same registered model.
    pub fn is(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The store this model was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::StoreClosed`] once the store has been shut down or dropped.
    pub fn store(&self) -> ModelResult<DocumentStore> {
        self.inner
            .store
            .upgrade()
            .map(DocumentStore::from_inner)
            .ok_or(ModelError::StoreClosed)
    }

    pub(crate) fn store_ref(&self) -> &Weak<StoreInner> {
        &self.inner.store
    }

    /// Builds an unsaved document from raw input.
    pub fn new_document(&self, raw: BsonDocument) -> ModelResult<Document> {
        Document::new(self, raw)
    }

    /// Starts a query for documents whose fields match `filter`.
    pub fn find(&self, filter: BsonDocument) -> Query {
        Query::new(self.clone(), filter)
    }

    /// Starts a query for the first document matching `filter`.
    pub fn find_one(&self, filter: BsonDocument) -> Query {
        Query::new(self.clone(), filter).limit(1).single()
    }

    /// Starts a query by identifier.
    ///
    /// A single identifier yields a single document, an array of identifiers a
    /// collection. Numeric identifiers match the string form documents are saved under.
    pub fn find_by_id(&self, id: impl Into<Bson>) -> Query {
        Query::new(self.clone(), doc! { "id": id.into() })
    }

    /// Starts a count of documents matching `filter`.
    pub fn count(&self, filter: BsonDocument) -> Query {
        Query::new(self.clone(), filter).count()
    }

    /// Builds a document from `data` and saves it.
    pub async fn create(&self, data: BsonDocument) -> ModelResult<Document> {
        let mut document = Document::new(self, data)?;
        document.save().await?;

        Ok(document)
    }

    /// Applies `data` to the documents matching `filter`.
    ///
    /// Without `multi` only the first match is updated; with `upsert` a document is
    /// created from `data` when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unsupported`] when `multi` and `upsert` are both set.
    pub async fn update(
        &self,
        filter: BsonDocument,
        data: BsonDocument,
        options: UpdateOptions,
    ) -> ModelResult<Results> {
        let concurrency = self.config().concurrency;

        match (options.multi, options.upsert) {
            (true, true) => Err(ModelError::Unsupported(
                "update with both multi and upsert".to_string(),
            )),
            (true, false) => {
                let mut results = self.find(filter).exec().await?.into_results();
                results.update(data).await?;
                Ok(results)
            }
            (false, upsert) => match self.find_one(filter).exec().await?.into_document() {
                Some(mut document) => {
                    document.update(data).await?;
                    Ok(Results::new(vec![document], concurrency))
                }
                None if upsert => {
                    debug!(model = self.name(), "no match for update, creating document");
                    let document = self.create(data).await?;
                    Ok(Results::new(vec![document], concurrency))
                }
                None => Ok(Results::new(Vec::new(), concurrency)),
            },
        }
    }

    /// Invokes a static declared on the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownMethod`] if no static named `name` exists.
    pub async fn call(&self, name: &str, args: Vec<Bson>) -> ModelResult<Value> {
        let function = self
            .schema()
            .static_named(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownMethod(name.to_string()))?;

        function(self.clone(), args).await
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_model_name() {
        let config = ModelConfig::builder("User").build();

        assert_eq!(config.index, "User");
        assert_eq!(config.doc_type, "User");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn config_overrides() {
        let config = ModelConfig::builder("User")
            .with_index("people")
            .with_doc_type("person")
            .with_page_size(50)
            .with_concurrency(0)
            .build();

        assert_eq!(config.index, "people");
        assert_eq!(config.doc_type, "person");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn detached_models_report_a_closed_store() {
        let model = Model::new("Orphan", Arc::new(Schema::new()), ModelConfig::builder("Orphan").build(), Weak::new())
            .expect("empty schema compiles");

        assert!(matches!(model.store(), Err(ModelError::StoreClosed)));
    }
}
