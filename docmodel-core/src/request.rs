//! Requests sent to and responses returned by a [`StoreBackend`](crate::backend::StoreBackend).
//!
//! The shapes follow a search engine's document API: documents live in an index under
//! a type name and are addressed by a string identifier. Every write returns the
//! identifier and the new version of the document.

use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};

use crate::query::Sort;

/// The address of a single stored document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentTarget {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

/// Stores a whole document, creating it when `id` is `None` or unknown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
    pub body: BsonDocument,
}

/// Merges `doc` into an existing document.
///
/// When `version` is set the backend must reject the update if the stored version
/// differs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub target: DocumentTarget,
    pub version: Option<i64>,
    pub doc: BsonDocument,
}

/// Fetches several documents by identifier.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MultiGetRequest {
    pub index: String,
    pub doc_type: String,
    pub ids: Vec<String>,
}

impl MultiGetRequest {
    /// Renders the request body, e.g. `{ "ids": ["a", "b"] }`.
    pub fn to_body(&self) -> BsonDocument {
        doc! { "ids": self.ids.clone() }
    }
}

/// A filtered, sorted and paginated search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub doc_type: String,
    /// Field values every hit must match.
    pub filter: BsonDocument,
    pub sort: Vec<Sort>,
    pub from: u64,
    pub size: u64,
    /// Source fields to return, `None` for all.
    pub fields: Option<Vec<String>>,
}

impl SearchRequest {
    /// Renders the request body, e.g.
    /// `{ "query": { "match": { "name": "Alice" } }, "sort": { "age": "desc" } }`.
    pub fn to_body(&self) -> BsonDocument {
        let sort = self
            .sort
            .iter()
            .map(|sort| (sort.field.clone(), Bson::String(sort.direction.as_str().to_string())))
            .collect::<BsonDocument>();

        doc! {
            "query": { "match": self.filter.clone() },
            "sort": sort,
        }
    }
}

/// A stored document as returned by reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub version: Option<i64>,
    pub source: BsonDocument,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    /// Number of documents matching the filter, regardless of pagination.
    pub total: u64,
    pub hits: Vec<Hit>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub id: String,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortDirection;

    #[test]
    fn search_body_has_match_and_sort_sections() {
        let request = SearchRequest {
            index: "users".into(),
            doc_type: "users".into(),
            filter: doc! { "name": "Alice" },
            sort: vec![
                Sort { field: "age".into(), direction: SortDirection::Desc },
                Sort { field: "name".into(), direction: SortDirection::Asc },
            ],
            from: 0,
            size: 10,
            fields: None,
        };

        assert_eq!(
            request.to_body(),
            doc! {
                "query": { "match": { "name": "Alice" } },
                "sort": { "age": "desc", "name": "asc" },
            }
        );
    }

    #[test]
    fn multi_get_body_lists_identifiers() {
        let request = MultiGetRequest {
            index: "users".into(),
            doc_type: "users".into(),
            ids: vec!["a".into(), "b".into()],
        };

        assert_eq!(request.to_body(), doc! { "ids": ["a", "b"] });
    }
}
