//! Ordered collections of documents returned by queries.

use bson::Document as BsonDocument;
use futures::{TryStreamExt, stream};

use crate::{
    deferred::Deferred,
    document::Document,
    error::{ModelError, ModelResult},
    model::Model,
    request::Hit,
};

/// The documents a query matched, in backend order.
///
/// Bulk operations run on up to `concurrency` documents at a time and stop at the first
/// failure. Documents already processed keep their new state.
#[derive(Debug, Clone)]
pub struct Results {
    items: Vec<Document>,
    concurrency: usize,
}

impl Results {
    pub fn new(items: Vec<Document>, concurrency: usize) -> Self {
        Self { items, concurrency }
    }

    pub(crate) fn from_hits(model: &Model, hits: Vec<Hit>) -> ModelResult<Self> {
        let items = hits
            .into_iter()
            .map(|hit| Document::from_hit(model, hit))
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(Self::new(items, model.config().concurrency))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.items.get_mut(index)
    }

    pub fn first(&self) -> Option<&Document> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Document> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Document> {
        self.items
    }

    /// Populates `path` on every document.
    pub async fn populate(&mut self, path: &str) -> ModelResult<()> {
        let limit = self.concurrency;

        stream::iter(self.items.iter_mut().map(Ok::<_, ModelError>))
            .try_for_each_concurrent(limit, |document| document.populate(path))
            .await
    }

    /// Saves every document.
    pub async fn save(&mut self) -> ModelResult<()> {
        let limit = self.concurrency;

        stream::iter(self.items.iter_mut().map(Ok::<_, ModelError>))
            .try_for_each_concurrent(limit, |document| document.save())
            .await
    }

    /// Applies `data` to every document and sends each one's changes.
    pub async fn update(&mut self, data: BsonDocument) -> ModelResult<()> {
        let limit = self.concurrency;

        stream::iter(self.items.iter_mut().map(Ok::<_, ModelError>))
            .try_for_each_concurrent(limit, |document| document.update(data.clone()))
            .await
    }

    /// Deletes every document.
    pub async fn remove(&mut self) -> ModelResult<()> {
        let limit = self.concurrency;

        stream::iter(self.items.iter().map(Ok::<_, ModelError>))
            .try_for_each_concurrent(limit, |document| document.remove())
            .await
    }

    pub fn deferred(&mut self) -> Deferred<'_, Self> {
        Deferred::new(self)
    }
}

impl IntoIterator for Results {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
