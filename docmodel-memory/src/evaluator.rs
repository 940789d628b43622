//! Match filter evaluation, sorting and projection for in-memory documents.
//!
//! A filter is a document of field/value pairs that must all match. Field names may
//! be dotted to reach into nested documents; arrays met along the way are searched
//! element by element. A stored array matches a scalar it contains, or an equal array.

use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use docmodel_core::{
    query::{Sort, SortDirection},
    value::Comparable,
};

/// Evaluates match filters against a single stored document.
pub(crate) struct DocumentEvaluator<'a> {
    id: &'a str,
    source: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(id: &'a str, source: &'a BsonDocument) -> Self {
        Self { id, source }
    }

    /// Returns `true` when every field of `filter` matches. An empty filter matches
    /// everything.
    pub fn matches(&self, filter: &BsonDocument) -> bool {
        filter
            .iter()
            .all(|(field, expected)| self.matches_field(field, expected))
    }

    fn matches_field(&self, field: &str, expected: &Bson) -> bool {
        let found = lookup(self.source, field);

        if found.is_empty() && field == "id" {
            return Comparable::from(&Bson::String(self.id.to_string())) == Comparable::from(expected);
        }

        found.into_iter().any(|actual| value_matches(actual, expected))
    }

    /// The value a document is sorted by, the first one found along `field`.
    pub fn sort_key(&self, field: &str) -> Option<&'a Bson> {
        lookup(self.source, field).into_iter().next()
    }
}

fn value_matches(actual: &Bson, expected: &Bson) -> bool {
    let wanted = Comparable::from(expected);

    match actual {
        Bson::Array(items) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| Comparable::from(item) == wanted)
        }
        _ => Comparable::from(actual) == wanted,
    }
}

/// Collects every value reachable through a dotted path.
pub(crate) fn lookup<'a>(source: &'a BsonDocument, path: &str) -> Vec<&'a Bson> {
    let mut current = vec![source];
    let mut segments = path.split('.').peekable();
    let mut found = Vec::new();

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        let mut next = Vec::new();

        for document in current {
            let Some(value) = document.get(segment) else {
                continue;
            };

            match value {
                _ if last => found.push(value),
                Bson::Document(inner) => next.push(inner),
                Bson::Array(items) => next.extend(items.iter().filter_map(Bson::as_document)),
                _ => {}
            }
        }

        current = next;
    }

    found
}

/// Orders two documents by a list of sort keys. Missing values sort as nulls.
pub(crate) fn compare(
    left: &DocumentEvaluator<'_>,
    right: &DocumentEvaluator<'_>,
    sort: &[Sort],
) -> Ordering {
    let null = Bson::Null;

    sort.iter()
        .map(|key| {
            let a = Comparable::from(left.sort_key(&key.field).unwrap_or(&null));
            let b = Comparable::from(right.sort_key(&key.field).unwrap_or(&null));

            match key.direction {
                SortDirection::Asc => a.total_cmp(&b),
                SortDirection::Desc => b.total_cmp(&a),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Keeps only the listed fields. Dotted names keep the nested value under the same path.
pub(crate) fn project(source: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut projected = BsonDocument::new();

    for field in fields {
        if let Some(value) = get_path(source, field) {
            insert_path(&mut projected, field, value.clone());
        }
    }

    projected
}

fn get_path<'a>(source: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    match rest {
        None => source.get(head),
        Some(rest) => get_path(source.get_document(head).ok()?, rest),
    }
}

fn insert_path(target: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            target.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, BsonDocument::new());
            }
            if let Ok(inner) = target.get_document_mut(head) {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Merges `patch` into `target`. Nested documents merge key by key, null removes the
/// key and anything else is replaced.
pub(crate) fn merge(target: &mut BsonDocument, patch: BsonDocument) {
    for (key, value) in patch {
        match value {
            Bson::Document(inner) if matches!(target.get(&key), Some(Bson::Document(_))) => {
                if let Ok(existing) = target.get_document_mut(&key) {
                    merge(existing, inner);
                }
            }
            Bson::Null => {
                target.remove(&key);
            }
            value => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(source: &BsonDocument, filter: BsonDocument) -> bool {
        DocumentEvaluator::new("doc-1", source).matches(&filter)
    }

    #[test]
    fn equality_normalizes_numbers() {
        let source = doc! { "name": "Alice", "age": 30.0 };

        assert!(matches(&source, doc! {}));
        assert!(matches(&source, doc! { "name": "Alice", "age": 30 }));
        assert!(!matches(&source, doc! { "name": "Alice", "age": 31 }));
        assert!(!matches(&source, doc! { "missing": 1 }));
    }

    #[test]
    fn arrays_match_contained_values() {
        let source = doc! { "tags": ["a", "b"] };

        assert!(matches(&source, doc! { "tags": "a" }));
        assert!(matches(&source, doc! { "tags": ["a", "b"] }));
        assert!(!matches(&source, doc! { "tags": "c" }));
        assert!(!matches(&source, doc! { "tags": ["a"] }));
    }

    #[test]
    fn dotted_paths_reach_into_documents_and_arrays() {
        let source = doc! {
            "address": { "city": "Berlin" },
            "items": [{ "sku": "x" }, { "sku": "y" }],
        };

        assert!(matches(&source, doc! { "address.city": "Berlin" }));
        assert!(matches(&source, doc! { "items.sku": "y" }));
        assert!(!matches(&source, doc! { "items.sku": "z" }));
    }

    #[test]
    fn identifier_falls_back_to_document_id() {
        let source = doc! { "name": "Alice" };

        assert!(matches(&source, doc! { "id": "doc-1" }));
        assert!(!matches(&source, doc! { "id": "doc-2" }));
    }

    #[test]
    fn projection_keeps_nested_paths() {
        let source = doc! { "name": "Alice", "address": { "city": "Berlin", "zip": 10115 } };
        let fields = vec!["name".to_string(), "address.city".to_string(), "nope".to_string()];

        assert_eq!(
            project(&source, &fields),
            doc! { "name": "Alice", "address": { "city": "Berlin" } }
        );
    }

    #[test]
    fn merge_is_deep() {
        let mut target = doc! { "a": 1, "nested": { "x": 1, "y": 2 } };
        merge(&mut target, doc! { "b": 2, "nested": { "y": 3 } });

        assert_eq!(target, doc! { "a": 1, "nested": { "x": 1, "y": 3 }, "b": 2 });
    }

    #[test]
    fn merging_null_clears_keys() {
        let mut target = doc! { "a": 1, "extra": "payload", "nested": { "x": 1, "y": 2 } };
        merge(&mut target, doc! { "extra": Bson::Null, "nested": { "y": Bson::Null } });

        assert_eq!(target, doc! { "a": 1, "nested": { "x": 1 } });
    }

    #[test]
    fn sorting_compares_keys_in_order() {
        let alice = doc! { "age": 30, "name": "Alice" };
        let bob = doc! { "age": 30, "name": "Bob" };
        let left = DocumentEvaluator::new("1", &alice);
        let right = DocumentEvaluator::new("2", &bob);

        let by_age_then_name = vec![
            Sort { field: "age".into(), direction: SortDirection::Asc },
            Sort { field: "name".into(), direction: SortDirection::Desc },
        ];

        assert_eq!(compare(&left, &right, &by_age_then_name), Ordering::Greater);
    }
}
