//! Document instances: a model's validated field values plus identity and persistence.
//!
//! A [`Document`] holds its fields in a root [`LiveObject`] built from the model's
//! compiled shape, so every assignment passes through the field's descriptor. The
//! document remembers the body it was loaded or last saved with; [`Document::changes`]
//! compares against that snapshot and drives [`Document::save`] and
//! [`Document::update`].
//!
//! # Example
//!
//! ```ignore
//! let mut user = users.new_document(doc! { "name": 4, "age": "31" })?;
//! assert_eq!(user.get("name"), Some(Value::from("4")));
//!
//! user.save().await?;
//! user.update(doc! { "age": 32 }).await?;
//! ```

use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::{
    deferred::Deferred,
    error::{ModelError, ModelResult, ValidationError, ValidationErrorKind},
    live::{LiveArray, LiveObject},
    model::Model,
    path::FieldPath,
    populate,
    request::{DocumentTarget, Hit, IndexRequest, UpdateRequest},
    schema::Virtual,
    types::format_number,
    value::{Value, same_value},
};

/// A single document of a registered model.
#[derive(Debug, Clone)]
pub struct Document {
    model: Model,
    root: LiveObject,
    original: BsonDocument,
    id: Option<String>,
    version: Option<i64>,
}

impl Document {
    /// Builds an unsaved document from raw input.
    ///
    /// Every declared field starts at its default. Each raw key is then assigned in
    /// input order through [`Document::set`]; `id` sets the identifier unless the
    /// schema declares a field of that name, and unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure among the raw values.
    pub fn new(model: &Model, raw: BsonDocument) -> ModelResult<Self> {
        Self::build(model, raw, &FieldPath::root())
    }

    /// Builds a document whose fields are located under `path`.
    pub(crate) fn build(model: &Model, raw: BsonDocument, path: &FieldPath) -> ModelResult<Self> {
        let root = LiveObject::defaulted(Arc::clone(model.shape()), path, model.store_ref())?;
        let mut document = Self {
            model: model.clone(),
            root,
            original: raw.clone(),
            id: None,
            version: None,
        };

        for (key, value) in raw {
            document.set(&key, value)?;
        }

        Ok(document)
    }

    /// Hydrates a stored document. The loaded body becomes the change-tracking baseline.
    pub(crate) fn from_hit(model: &Model, hit: Hit) -> ModelResult<Self> {
        let mut document = Self::build(model, hit.source, &FieldPath::root())?;
        document.id = Some(hit.id);
        document.version = hit.version;
        document.original = document.to_body();

        Ok(document)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The version token returned by the last write or read, if any.
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    /// Reads a virtual property or a field, running getters.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(getter) = self.model.schema().virtual_named(key).and_then(Virtual::getter) {
            return Some(getter(self));
        }

        match self.root.get(key) {
            Some(value) => Some(value),
            None if key == "id" => self.id.clone().map(Value::from),
            None => None,
        }
    }

    /// Assigns a virtual property or a field.
    ///
    /// Declared fields are validated and coerced; `id` sets the identifier when no
    /// field of that name is declared. Anything else is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] if the value is rejected by the field's
    /// descriptor. The previous value is kept.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();

        if let Some(property) = self.model.schema().virtual_named(key) {
            return match property.setter().cloned() {
                Some(setter) => setter(self, value),
                None => {
                    trace!(model = self.model.name(), key, "virtual has no setter, ignoring");
                    Ok(())
                }
            };
        }

        if self.root.shape().field(key).is_some() {
            return self.root.set(key, value);
        }

        if key == "id" {
            self.id = value.as_bson().and_then(id_string);
            return Ok(());
        }

        trace!(model = self.model.name(), key, "ignoring undeclared key");
        Ok(())
    }

    pub fn array_mut(&mut self, key: &str) -> Option<&mut LiveArray> {
        self.root.array_mut(key)
    }

    pub fn object_mut(&mut self, key: &str) -> Option<&mut LiveObject> {
        self.root.object_mut(key)
    }

    pub fn document_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.root.document_mut(key)
    }

    /// The validated field values.
    pub fn root(&self) -> &LiveObject {
        &self.root
    }

    /// The body this document was created, loaded or last saved with.
    pub fn original(&self) -> &BsonDocument {
        &self.original
    }

    /// The persisted form of the fields, without the identifier. Null fields are left out.
    pub fn to_body(&self) -> BsonDocument {
        self.root.to_bson_document()
    }

    /// The persisted form of the fields plus `id` when the document has one.
    pub fn to_bson(&self) -> Bson {
        let mut body = self.to_body();
        if let Some(id) = &self.id {
            body.insert("id", id.clone());
        }

        Bson::Document(body)
    }

    pub fn to_json(&self) -> ModelResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_bson())?)
    }

    /// Fields whose value differs from [`Document::original`].
    ///
    /// Fields that held a value in the snapshot and are now null are reported as
    /// [`Bson::Null`], as are cleared keys inside changed embedded objects.
    pub fn changes(&self) -> BsonDocument {
        let body = self.to_body();
        let mut changes = BsonDocument::new();

        for (key, value) in &body {
            match self.original.get(key) {
                Some(previous) if same_value(previous, value) => {}
                previous => {
                    changes.insert(key.clone(), with_cleared(previous, value.clone()));
                }
            }
        }

        for (key, previous) in &self.original {
            let cleared = !body.contains_key(key)
                && self.root.field(key).is_some_and(Value::is_null)
                && !matches!(previous, Bson::Null);
            if cleared {
                changes.insert(key.clone(), Bson::Null);
            }
        }

        changes
    }

    pub fn is_modified(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Checks that every required field, at any depth, holds a value.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationErrorKind::Required`] failure for the first empty field.
    pub fn validate(&self) -> ModelResult<()> {
        check_required(&self.root)
    }

    /// Writes the whole document.
    ///
    /// Unsaved documents are created and take the identifier the backend assigns.
    /// Documents already versioned by the backend are left alone when unchanged.
    ///
    /// # Errors
    ///
    /// Validation failures are returned before anything is sent. Backend errors are
    /// forwarded as [`ModelError::Backend`].
    pub async fn save(&mut self) -> ModelResult<()> {
        self.validate()?;

        if self.version.is_some() && !self.is_modified() {
            trace!(model = self.model.name(), id = ?self.id, "document unchanged, skipping save");
            return Ok(());
        }

        let store = self.model.store()?;
        let config = self.model.config();
        let body = self.to_body();
        let request = IndexRequest {
            index: config.index.clone(),
            doc_type: config.doc_type.clone(),
            id: self.id.clone(),
            body: body.clone(),
        };

        let written = store.backend().index_document(request).await?;

        debug!(
            model = self.model.name(),
            id = written.id.as_str(),
            version = written.version,
            "saved document"
        );

        self.id = Some(written.id);
        self.version = Some(written.version);
        self.original = body;

        Ok(())
    }

    /// Assigns `data` and sends the resulting changes, guarded by the current version.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingIdentifier`] for unsaved documents. A stale
    /// version surfaces as a backend
    /// [`VersionConflict`](crate::error::DocumentStoreError::VersionConflict).
    pub async fn update(&mut self, data: BsonDocument) -> ModelResult<()> {
        let id = self.id.clone().ok_or(ModelError::MissingIdentifier("update"))?;

        for (key, value) in data {
            if key != "id" {
                self.set(&key, value)?;
            }
        }
        self.validate()?;

        let changes = self.changes();
        if changes.is_empty() {
            trace!(model = self.model.name(), id = id.as_str(), "no changes to update");
            return Ok(());
        }

        let store = self.model.store()?;
        let request = UpdateRequest {
            target: self.target(id),
            version: self.version,
            doc: changes,
        };

        debug!(
            model = self.model.name(),
            id = request.target.id.as_str(),
            fields = request.doc.len(),
            "updating document"
        );

        let written = store.backend().update_document(request).await?;
        self.version = Some(written.version);
        self.original = self.to_body();

        Ok(())
    }

    /// Deletes the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingIdentifier`] for unsaved documents.
    pub async fn remove(&self) -> ModelResult<()> {
        let id = self.id.clone().ok_or(ModelError::MissingIdentifier("remove"))?;
        let store = self.model.store()?;

        debug!(model = self.model.name(), id = id.as_str(), "removing document");
        store.backend().delete_document(self.target(id)).await?;

        Ok(())
    }

    /// Replaces stored identifiers along a dotted path with the documents they refer to.
    pub async fn populate(&mut self, path: &str) -> ModelResult<()> {
        populate::populate(self, path).await
    }

    /// Invokes a method declared on the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownMethod`] if no method named `name` exists.
    pub fn call(&mut self, name: &str, args: &[Bson]) -> ModelResult<Value> {
        let method = self
            .model
            .schema()
            .method_named(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownMethod(name.to_string()))?;

        method(self, args)
    }

    /// Starts a queue of persistence commands run later, in order.
    pub fn deferred(&mut self) -> Deferred<'_, Self> {
        Deferred::new(self)
    }

    pub(crate) fn root_mut(&mut self) -> &mut LiveObject {
        &mut self.root
    }

    pub(crate) fn rebase(&mut self, path: &FieldPath) {
        self.root.rebase(path);
    }

    fn target(&self, id: String) -> DocumentTarget {
        let config = self.model.config();

        DocumentTarget {
            index: config.index.clone(),
            doc_type: config.doc_type.clone(),
            id,
        }
    }
}

/// Renders identifier-like values as the string form used to address documents.
pub(crate) fn id_string(value: &Bson) -> Option<String> {
    match value {
        Bson::String(id) => Some(id.clone()),
        Bson::Int32(id) => Some(id.to_string()),
        Bson::Int64(id) => Some(id.to_string()),
        Bson::Double(id) => Some(format_number(*id)),
        Bson::ObjectId(id) => Some(id.to_hex()),
        _ => None,
    }
}

/// Marks keys of `previous` that `current` no longer holds as null, at any depth.
fn with_cleared(previous: Option<&Bson>, current: Bson) -> Bson {
    match (previous, current) {
        (Some(Bson::Document(previous)), Bson::Document(mut current)) => {
            for (key, old) in previous {
                match current.get(key).cloned() {
                    Some(value) => {
                        current.insert(key.clone(), with_cleared(Some(old), value));
                    }
                    None if !matches!(old, Bson::Null) => {
                        current.insert(key.clone(), Bson::Null);
                    }
                    None => {}
                }
            }
            Bson::Document(current)
        }
        (_, current) => current,
    }
}

fn check_required(object: &LiveObject) -> ModelResult<()> {
    for (name, ty) in object.shape().fields() {
        let value = object.field(name);

        if ty.is_required() && value.is_none_or(Value::is_null) {
            let path = object.path().key(name);
            return Err(ValidationError::new(&path, ValidationErrorKind::Required).into());
        }

        if let Some(value) = value {
            check_nested(value)?;
        }
    }

    Ok(())
}

fn check_nested(value: &Value) -> ModelResult<()> {
    match value {
        Value::Object(object) => check_required(object),
        Value::Array(array) => array.iter().try_for_each(check_nested),
        Value::Document(document) => document.validate(),
        Value::Null | Value::Scalar(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn identifiers_render_as_strings() {
        assert_eq!(id_string(&Bson::from("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&Bson::Int32(7)), Some("7".to_string()));
        assert_eq!(id_string(&Bson::Double(7.0)), Some("7".to_string()));
        assert_eq!(id_string(&Bson::Boolean(true)), None);

        let oid = ObjectId::new();
        assert_eq!(id_string(&Bson::ObjectId(oid)), Some(oid.to_hex()));
    }
}
