//! Field values held by documents and live containers.
//!
//! A [`Value`] is what a field reads back as after validation. Scalars are kept as
//! [`Bson`]; arrays, nested objects and referenced documents are wrapped in the live
//! container types that keep validating on mutation.
//!
//! [`Comparable`] provides the structural equality and ordering used for change
//! detection, enum constraints and backend-side sorting.

use bson::{Bson, DateTime, Document as BsonDocument};
use std::{cmp::Ordering, collections::HashMap};

use crate::{
    document::Document,
    live::{LiveArray, LiveObject},
    path::FieldPath,
};

/// A post-validation field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent or null.
    #[default]
    Null,
    /// A primitive value (string, number, boolean, date, identifier, untyped scalar).
    Scalar(Bson),
    /// A live array.
    Array(LiveArray),
    /// A live nested object.
    Object(LiveObject),
    /// A hydrated document, either an embedded reference or a populated identifier.
    Document(Box<Document>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bson(&self) -> Option<&Bson> {
        match self {
            Value::Scalar(bson) => Some(bson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Bson::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Bson::Double(value)) => Some(*value),
            Value::Scalar(Bson::Int32(value)) => Some(*value as f64),
            Value::Scalar(Bson::Int64(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Bson::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Value::Scalar(Bson::DateTime(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&LiveArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&LiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }

    /// Serializes this value into its persisted form.
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Scalar(bson) => bson.clone(),
            Value::Array(array) => array.to_bson(),
            Value::Object(object) => Bson::Document(object.to_bson_document()),
            Value::Document(document) => document.to_bson(),
        }
    }

    /// Moves any container inside this value to a new location.
    pub(crate) fn rebase(&mut self, path: &FieldPath) {
        match self {
            Value::Array(array) => array.rebase(path),
            Value::Object(object) => object.rebase(path),
            Value::Document(document) => document.rebase(path),
            Value::Null | Value::Scalar(_) => {}
        }
    }

    pub(crate) fn mutable_array(&mut self) -> Option<&mut LiveArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub(crate) fn mutable_object(&mut self) -> Option<&mut LiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub(crate) fn mutable_document(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(document) => Some(document),
            _ => None,
        }
    }
}

/// Raw input is wrapped structurally: arrays and documents become untyped live
/// containers so every nested value has a single representation.
impl From<Bson> for Value {
    fn from(bson: Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Array(items) => Value::Array(LiveArray::untyped(
                items.into_iter().map(Value::from).collect(),
            )),
            Bson::Document(document) => Value::Object(LiveObject::untyped(document)),
            scalar => Value::Scalar(scalar),
        }
    }
}

impl From<BsonDocument> for Value {
    fn from(document: BsonDocument) -> Self {
        Value::Object(LiveObject::untyped(document))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(Bson::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(Bson::String(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(Bson::Double(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Scalar(Bson::Int32(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(Bson::Int64(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(Bson::Boolean(value))
    }
}

impl From<DateTime> for Value {
    fn from(value: DateTime) -> Self {
        Value::Scalar(Bson::DateTime(value))
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::from(Bson::Array(items.into_iter().map(Into::into).collect()))
    }
}

impl From<LiveArray> for Value {
    fn from(array: LiveArray) -> Self {
        Value::Array(array)
    }
}

impl From<LiveObject> for Value {
    fn from(object: LiveObject) -> Self {
        Value::Object(object)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Document(Box::new(document))
    }
}

/// Values compare structurally on their persisted form, with all numeric types
/// treated as one.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let (left, right) = (self.to_bson(), other.to_bson());
        Comparable::from(&left) == Comparable::from(&right)
    }
}

/// Ordered key/value store backing a [`LiveObject`].
///
/// Keys keep their insertion order, which is the order fields were declared in
/// followed by undeclared keys in the order they were first assigned.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Inserts or replaces a value, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();

        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to `f64` so that a stored `Int32(30)` and a
/// coerced `Double(30.0)` are considered equal. Maps compare without regard to key
/// order.
#[derive(Debug)]
pub enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value, compared by its rendered form.
    Other(String),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Other(other.to_string()),
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total ordering used for sorting: values of different types order by type
    /// rank (nulls first), values of the same type by their natural order.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.total_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a.len().cmp(&b.len()),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Other(a), Comparable::Other(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Structural equality of two BSON values with numeric normalization.
pub fn same_value(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numbers_compare_across_widths() {
        assert!(same_value(&Bson::Int32(30), &Bson::Double(30.0)));
        assert!(same_value(&Bson::Int64(7), &Bson::Int32(7)));
        assert!(!same_value(&Bson::Int32(7), &Bson::String("7".into())));
    }

    #[test]
    fn maps_ignore_key_order() {
        let left = Bson::Document(doc! { "a": 1, "b": { "c": [1, 2] } });
        let right = Bson::Document(doc! { "b": { "c": [1.0, 2.0] }, "a": 1.0 });
        assert!(same_value(&left, &right));
    }

    #[test]
    fn total_order_puts_nulls_first() {
        let null = Bson::Null;
        let number = Bson::Int32(1);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).total_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).total_cmp(&Comparable::from(&number)), Ordering::Greater);
        assert_eq!(Comparable::from(&number).total_cmp(&Comparable::from(&number)), Ordering::Equal);
    }

    #[test]
    fn raw_bson_becomes_untyped_containers() {
        let value = Value::from(Bson::Document(doc! { "tags": ["a", "b"], "n": 1 }));
        let object = value.as_object().expect("object");
        let tags = object.get("tags").expect("tags");

        assert_eq!(tags.as_array().map(|array| array.len()), Some(2));
        assert_eq!(object.get("n"), Some(Value::from(1.0)));
    }

    #[test]
    fn value_map_keeps_insertion_order() {
        let mut map = ValueMap::new();
        map.insert("b", Value::from(1));
        map.insert("a", Value::from(2));
        map.insert("b", Value::from(3));

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&Value::from(3)));
    }
}
