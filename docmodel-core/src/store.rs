//! The document store: a backend handle plus the registry of models bound to it.
//!
//! Models are registered once per name and looked up many times. Every model keeps a
//! weak handle back to the store it was registered with, which is how documents reach
//! the backend and how reference fields find the model registered for their schema.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let users = store.register("User", Schema::new().field("name", FieldSpec::string()))?;
//!
//! assert!(store.lookup("User").is_some());
//! assert!(store.model("Post").is_err());
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    error::{ModelError, ModelResult},
    model::{Model, ModelConfig},
    schema::Schema,
};

/// State shared by a [`DocumentStore`] and every model registered with it.
#[derive(Debug)]
pub struct StoreInner {
    backend: Box<dyn DynStoreBackend>,
    models: RwLock<Vec<Model>>,
}

impl StoreInner {
    pub(crate) fn backend(&self) -> &dyn DynStoreBackend {
        &*self.backend
    }

    /// Finds the first registered model using exactly this schema instance.
    pub(crate) fn model_for_schema(&self, schema: &Arc<Schema>) -> Option<Model> {
        self.models
            .read()
            .iter()
            .find(|model| Arc::ptr_eq(model.schema(), schema))
            .cloned()
    }
}

/// A backend together with the models registered against it.
///
/// Cloning is cheap; clones share the backend and the registry.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
}

impl DocumentStore {
    /// Creates a new document store with the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::from_dyn(Box::new(backend))
    }

    /// Creates a new document store with the given backend trait object.
    pub fn from_dyn(backend: Box<dyn DynStoreBackend>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                models: RwLock::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Registers `schema` under `name` using the default [`ModelConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ModelAlreadyRegistered`] if the name is taken, or
    /// [`ModelError::UnknownType`] if a field type cannot be resolved.
    pub fn register(&self, name: &str, schema: impl Into<Arc<Schema>>) -> ModelResult<Model> {
        self.register_with(name, schema, ModelConfig::builder(name).build())
    }

    /// Registers `schema` under `name` with an explicit configuration.
    ///
    /// The schema's field specifications are compiled here; later changes to the
    /// schema do not affect the returned model.
    pub fn register_with(
        &self,
        name: &str,
        schema: impl Into<Arc<Schema>>,
        config: ModelConfig,
    ) -> ModelResult<Model> {
        let mut models = self.inner.models.write();

        if models.iter().any(|model| model.name() == name) {
            return Err(ModelError::ModelAlreadyRegistered(name.to_string()));
        }

        let model = Model::new(name, schema.into(), config, Arc::downgrade(&self.inner))?;
        models.push(model.clone());

        debug!(
            model = name,
            index = model.config().index.as_str(),
            doc_type = model.config().doc_type.as_str(),
            "registered model"
        );

        Ok(model)
    }

    /// Returns the model registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ModelNotRegistered`] if no such model exists.
    pub fn model(&self, name: &str) -> ModelResult<Model> {
        self.lookup(name)
            .ok_or_else(|| ModelError::ModelNotRegistered(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<Model> {
        self.inner
            .models
            .read()
            .iter()
            .find(|model| model.name() == name)
            .cloned()
    }

    /// Returns the first registered model using exactly this schema instance.
    pub fn model_for_schema(&self, schema: &Arc<Schema>) -> Option<Model> {
        self.inner.model_for_schema(schema)
    }

    pub fn models(&self) -> Vec<Model> {
        self.inner.models.read().clone()
    }

    pub fn backend(&self) -> &dyn DynStoreBackend {
        self.inner.backend()
    }

    /// Returns the backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.inner.backend.as_any().downcast_ref::<B>()
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// Models registered with this store fail with [`ModelError::StoreClosed`]
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unsupported`] while other clones of this store are alive,
    /// or the backend's shutdown error.
    pub async fn shutdown(self) -> ModelResult<()> {
        let inner = Arc::try_unwrap(self.inner)
            .map_err(|_| ModelError::Unsupported("shutdown of a shared document store".to_string()))?;

        inner.backend.shutdown_boxed().await?;

        Ok(())
    }
}
