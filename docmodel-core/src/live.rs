//! Containers for array- and object-typed fields that keep validating on mutation.
//!
//! Values inside a [`LiveArray`] or [`LiveObject`] can only be changed through the
//! container's own methods, each of which runs the new value through the field's
//! descriptor at the position it will occupy. There is no way to obtain a mutable
//! reference to a stored [`Value`] directly.

use bson::{Bson, Document as BsonDocument};
use std::sync::{Arc, Weak};

use crate::{
    document::Document,
    error::ModelResult,
    path::FieldPath,
    store::StoreInner,
    types::{ObjectShape, SchemaType},
    value::{Value, ValueMap},
};

/// An array whose elements have all passed through its element descriptor.
#[derive(Debug, Clone)]
pub struct LiveArray {
    element: Option<Arc<SchemaType>>,
    items: Vec<Value>,
    path: FieldPath,
    store: Weak<StoreInner>,
}

impl LiveArray {
    pub(crate) fn new(element: Option<Arc<SchemaType>>, path: FieldPath, store: Weak<StoreInner>) -> Self {
        Self {
            element,
            items: Vec::new(),
            path,
            store,
        }
    }

    pub(crate) fn untyped(items: Vec<Value>) -> Self {
        Self {
            element: None,
            items,
            path: FieldPath::root(),
            store: Weak::new(),
        }
    }

    /// Wraps the elements of `source` into an array typed by `element` located at `path`.
    pub(crate) fn coerce(
        element: Option<Arc<SchemaType>>,
        source: LiveArray,
        path: &FieldPath,
        store: &Weak<StoreInner>,
    ) -> ModelResult<Self> {
        let mut array = Self::new(element, path.clone(), store.clone());

        if array.element.is_none() {
            array.items = source.items;
            array.rebase(path);
            return Ok(array);
        }

        for item in source.items {
            array.push(item)?;
        }

        Ok(array)
    }

    /// Validates `value` at the next index and appends it.
    ///
    /// # Errors
    ///
    /// Returns the validation failure, path suffixed with the would-be index. The array
    /// is left unchanged.
    pub fn push(&mut self, value: impl Into<Value>) -> ModelResult<()> {
        let value = self.check(value.into(), self.items.len())?;
        self.items.push(value);
        Ok(())
    }

    /// Validates `value` at index 0 and prepends it.
    pub fn unshift(&mut self, value: impl Into<Value>) -> ModelResult<()> {
        let value = self.check(value.into(), 0)?;
        self.items.insert(0, value);
        self.rebase_from(1);
        Ok(())
    }

    /// Validates `value` at `index` and replaces the element there. Out of range
    /// indices append.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> ModelResult<()> {
        if index >= self.items.len() {
            return self.push(value);
        }

        let value = self.check(value.into(), index)?;
        self.items[index] = value;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    pub fn remove(&mut self, index: usize) -> Option<Value> {
        if index >= self.items.len() {
            return None;
        }

        let removed = self.items.remove(index);
        self.rebase_from(index);
        Some(removed)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn is_typed(&self) -> bool {
        self.element.is_some()
    }

    pub fn array_mut(&mut self, index: usize) -> Option<&mut LiveArray> {
        self.items.get_mut(index).and_then(Value::mutable_array)
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut LiveObject> {
        self.items.get_mut(index).and_then(Value::mutable_object)
    }

    pub fn document_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.items.get_mut(index).and_then(Value::mutable_document)
    }

    pub fn to_bson(&self) -> Bson {
        Bson::Array(self.items.iter().map(Value::to_bson).collect())
    }

    /// Stores `value` without validation. Used when resolving references in place.
    pub(crate) fn replace(&mut self, index: usize, mut value: Value) {
        if let Some(slot) = self.items.get_mut(index) {
            value.rebase(&self.path.index(index));
            *slot = value;
        }
    }

    pub(crate) fn items_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        self.items.iter_mut()
    }

    pub(crate) fn rebase(&mut self, path: &FieldPath) {
        self.path = path.clone();
        self.rebase_from(0);
    }

    fn rebase_from(&mut self, start: usize) {
        for (index, item) in self.items.iter_mut().enumerate().skip(start) {
            item.rebase(&self.path.index(index));
        }
    }

    fn check(&self, mut value: Value, index: usize) -> ModelResult<Value> {
        let path = self.path.index(index);

        match &self.element {
            Some(element) => element.validate(value, &path, &self.store),
            None => {
                value.rebase(&path);
                Ok(value)
            }
        }
    }
}

/// A keyed object whose declared fields have all passed through their descriptors.
///
/// Keys without a declaration are stored as given.
#[derive(Debug, Clone)]
pub struct LiveObject {
    shape: Arc<ObjectShape>,
    values: ValueMap,
    path: FieldPath,
    store: Weak<StoreInner>,
}

impl LiveObject {
    pub(crate) fn untyped(document: BsonDocument) -> Self {
        let mut values = ValueMap::new();
        for (key, value) in document {
            values.insert(key, Value::from(value));
        }

        Self {
            shape: Arc::new(ObjectShape::default()),
            values,
            path: FieldPath::root(),
            store: Weak::new(),
        }
    }

    /// Creates an object at `path` holding the default of every declared field.
    pub(crate) fn defaulted(
        shape: Arc<ObjectShape>,
        path: &FieldPath,
        store: &Weak<StoreInner>,
    ) -> ModelResult<Self> {
        let mut values = ValueMap::new();

        for (name, ty) in shape.fields() {
            values.insert(name, ty.default(Value::Null, &path.key(name), store)?);
        }

        Ok(Self {
            shape,
            values,
            path: path.clone(),
            store: store.clone(),
        })
    }

    /// Reads a field, running its getter when one is declared.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.shape.field(key).and_then(SchemaType::getter) {
            Some(getter) => Some(getter(&self.values)),
            None => self.values.get(key).cloned(),
        }
    }

    /// Borrows the stored value of a field, bypassing any getter.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Writes a field.
    ///
    /// A declared setter receives the raw value. Otherwise declared fields are validated
    /// at `path.key`, and undeclared keys are stored as given.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> ModelResult<()> {
        let mut value = value.into();
        let path = self.path.key(key);

        match self.shape.field(key) {
            Some(ty) => match ty.setter() {
                Some(setter) => setter(&mut self.values, value),
                None => {
                    let value = ty.validate(value, &path, &self.store)?;
                    self.values.insert(key, value);
                }
            },
            None => {
                value.rebase(&path);
                self.values.insert(key, value);
            }
        }

        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn shape(&self) -> &Arc<ObjectShape> {
        &self.shape
    }

    pub fn array_mut(&mut self, key: &str) -> Option<&mut LiveArray> {
        self.values.get_mut(key).and_then(Value::mutable_array)
    }

    pub fn object_mut(&mut self, key: &str) -> Option<&mut LiveObject> {
        self.values.get_mut(key).and_then(Value::mutable_object)
    }

    pub fn document_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.values.get_mut(key).and_then(Value::mutable_document)
    }

    /// Serializes the stored values, leaving out null fields.
    pub fn to_bson_document(&self) -> BsonDocument {
        self.values
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.to_string(), value.to_bson()))
            .collect()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Value)> {
        self.values.into_entries()
    }

    /// Stores `value` without validation. Used when resolving references in place.
    pub(crate) fn replace(&mut self, key: &str, mut value: Value) {
        value.rebase(&self.path.key(key));
        self.values.insert(key, value);
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.values.values_mut()
    }

    pub(crate) fn value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub(crate) fn rebase(&mut self, path: &FieldPath) {
        self.path = path.clone();
        for (key, value) in self.values.values_mut() {
            value.rebase(&path.key(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ValidationErrorKind, schema::FieldSpec};
    use bson::doc;

    fn typed_array(element: FieldSpec, at: &str) -> LiveArray {
        let element = SchemaType::dispatch(&element, &FieldPath::from(at)).expect("dispatch");
        LiveArray::new(Some(Arc::new(element)), FieldPath::from(at), Weak::new())
    }

    fn failing_path(result: ModelResult<()>) -> String {
        result
            .expect_err("insert should fail")
            .as_validation()
            .expect("validation error")
            .path
            .to_string()
    }

    #[test]
    fn push_validates_at_the_next_index() {
        let mut array = typed_array(FieldSpec::number(), "scores");

        array.push("1").expect("coerced");
        array.push(2).expect("number");
        assert_eq!(failing_path(array.push("many")), "scores[2]");
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0).and_then(Value::as_f64), Some(1.0));
    }

    #[test]
    fn unshift_validates_at_zero_and_leaves_array_untouched_on_failure() {
        let mut array = typed_array(FieldSpec::number().min(0.0), "scores");
        array.push(5).expect("push");

        assert_eq!(failing_path(array.unshift(-1)), "scores[0]");
        assert_eq!(array.len(), 1);

        array.unshift(1).expect("unshift");
        assert_eq!(
            array.iter().filter_map(Value::as_f64).collect::<Vec<_>>(),
            vec![1.0, 5.0]
        );
    }

    #[test]
    fn shifted_objects_report_their_new_index() {
        let mut array = typed_array(FieldSpec::object([("amount", FieldSpec::number())]), "items");
        array.push(doc! { "amount": 1 }).expect("first");
        array.unshift(doc! { "amount": 0 }).expect("second");

        let moved = array.object_mut(1).expect("object");
        assert_eq!(moved.path().to_string(), "items[1]");

        let err = moved.set("amount", "none").expect_err("not a number");
        assert_eq!(err.as_validation().expect("validation").path.to_string(), "items[1].amount");
    }

    #[test]
    fn untyped_arrays_store_anything() {
        let mut array = LiveArray::new(None, FieldPath::from("misc"), Weak::new());
        array.push("a").expect("string");
        array.push(doc! { "b": 1 }).expect("object");

        assert_eq!(array.to_bson(), Bson::Array(vec![Bson::from("a"), Bson::Document(doc! { "b": 1 })]));
    }

    #[test]
    fn objects_default_and_validate_declared_keys() {
        let shape = ObjectShape::compile(
            &[
                ("city".to_string(), FieldSpec::string().default("Berlin")),
                ("zip".to_string(), FieldSpec::number()),
                ("lines".to_string(), FieldSpec::array_of(FieldSpec::string())),
            ],
            &FieldPath::from("address"),
        )
        .expect("shape");
        let mut object = LiveObject::defaulted(Arc::new(shape), &FieldPath::from("address"), &Weak::new())
            .expect("defaults");

        assert_eq!(object.get("city").and_then(|v| v.as_str().map(str::to_owned)), Some("Berlin".into()));
        assert!(object.get("zip").is_some_and(|v| v.is_null()));
        assert!(object.field("lines").and_then(Value::as_array).is_some_and(LiveArray::is_empty));

        let err = object.set("zip", "abc").expect_err("invalid zip");
        let validation = err.as_validation().expect("validation");
        assert_eq!(validation.path.to_string(), "address.zip");
        assert_eq!(validation.kind, ValidationErrorKind::InvalidNumber);

        object.set("note", "free text").expect("undeclared");
        assert_eq!(
            object.to_bson_document(),
            doc! { "city": "Berlin", "lines": [], "note": "free text" }
        );
    }

    #[test]
    fn getters_and_setters_replace_plain_access() {
        let shape = ObjectShape::compile(
            &[
                ("first".to_string(), FieldSpec::string()),
                (
                    "full".to_string(),
                    FieldSpec::string()
                        .get(|values| {
                            let first = values.get("first").and_then(Value::as_str).unwrap_or_default();
                            Value::from(format!("{first} Doe"))
                        })
                        .set(|values, value| values.insert("first", value)),
                ),
            ],
            &FieldPath::root(),
        )
        .expect("shape");
        let mut object = LiveObject::defaulted(Arc::new(shape), &FieldPath::root(), &Weak::new())
            .expect("defaults");

        object.set("full", "Jane").expect("setter");
        assert_eq!(object.get("full"), Some(Value::from("Jane Doe")));
        assert_eq!(object.get("first"), Some(Value::from("Jane")));
    }
}
