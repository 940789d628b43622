//! Query construction and execution.
//!
//! A [`Query`] is built by a model's finders and refined with chainable modifiers.
//! Nothing is sent to the backend until [`Query::exec`] is awaited.
//!
//! # Query Building
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let page = users
//!     .find(doc! { "city": "Berlin" })
//!     .sort(doc! { "age": "desc" })
//!     .skip(20)
//!     .limit(10)
//!     .select("name age")
//!     .populate("friends")
//!     .exec()
//!     .await?
//!     .into_results();
//! ```
//!
//! # Compilation
//!
//! - An `id` filter holding a scalar identifier or an array of them becomes a
//!   multi-get. Numbers and object ids address the document by their string form. A
//!   scalar yields a single document, an array a collection.
//! - Any other filter becomes a search whose `from`/`size` come from `skip`/`limit`,
//!   falling back to 0 and the model's page size.
//! - `count` returns the number of matches instead of documents.
//! - `lean` returns raw hits unless population was requested.

use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    document::{Document, id_string},
    error::ModelResult,
    model::{DEFAULT_CONCURRENCY, Model},
    request::{Hit, MultiGetRequest, SearchRequest},
    results::Results,
};

/// Sort direction for query results.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Reads a direction from a sort map value. `"desc"`, `"descending"` and `-1` are
    /// descending; everything else is ascending.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::String(text) if text == "desc" || text == "descending" => SortDirection::Desc,
            Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Desc,
            Bson::Double(number) if *number == -1.0 => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort specification for query results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by. Dotted names address nested fields.
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub skip: u64,
    /// `None` uses the model's page size.
    pub limit: Option<u64>,
    pub sort: Vec<Sort>,
    /// Source fields to return, `None` for all.
    pub fields: Option<Vec<String>>,
    pub lean: bool,
    /// Paths populated on every returned document, in order.
    pub populate: Vec<String>,
    pub count: bool,
    /// Return the first match instead of a collection.
    pub single: bool,
}

/// The backend request a query compiles to.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    MultiGet { request: MultiGetRequest, single: bool },
    Search { request: SearchRequest, single: bool },
}

/// What a query produced.
#[derive(Debug)]
pub enum QueryOutput {
    Document(Option<Document>),
    Documents(Results),
    Count(u64),
    Hit(Option<Hit>),
    Hits(Vec<Hit>),
}

impl QueryOutput {
    /// The single document, or the first of a collection.
    pub fn into_document(self) -> Option<Document> {
        match self {
            QueryOutput::Document(document) => document,
            QueryOutput::Documents(results) => results.into_iter().next(),
            _ => None,
        }
    }

    /// The documents, wrapping a single result in a collection.
    pub fn into_results(self) -> Results {
        match self {
            QueryOutput::Documents(results) => results,
            QueryOutput::Document(document) => {
                Results::new(document.into_iter().collect(), DEFAULT_CONCURRENCY)
            }
            _ => Results::new(Vec::new(), DEFAULT_CONCURRENCY),
        }
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.into_results().into_vec()
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            QueryOutput::Count(total) => Some(*total),
            _ => None,
        }
    }

    /// The raw hits of a lean query.
    pub fn into_hits(self) -> Vec<Hit> {
        match self {
            QueryOutput::Hit(hit) => hit.into_iter().collect(),
            QueryOutput::Hits(hits) => hits,
            _ => Vec::new(),
        }
    }
}

/// A pending query against a model.
#[derive(Debug, Clone)]
pub struct Query {
    model: Model,
    filter: BsonDocument,
    options: QueryOptions,
}

impl Query {
    pub fn new(model: Model, filter: BsonDocument) -> Self {
        Self {
            model,
            filter,
            options: QueryOptions::default(),
        }
    }

    pub fn filter(&self) -> &BsonDocument {
        &self.filter
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Replaces the sort order with a sort map such as `{ "age": "desc", "name": 1 }`.
    pub fn sort(mut self, spec: BsonDocument) -> Self {
        self.options.sort = spec
            .iter()
            .map(|(field, direction)| Sort {
                field: field.clone(),
                direction: SortDirection::from_bson(direction),
            })
            .collect();
        self
    }

    /// Appends a sort key.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = skip;
        self
    }

    /// Restricts the returned source fields to a whitespace-separated list.
    pub fn select(mut self, fields: &str) -> Self {
        let fields = fields.split_whitespace().map(str::to_owned).collect::<Vec<_>>();
        self.options.fields = (!fields.is_empty()).then_some(fields);
        self
    }

    pub fn lean(mut self) -> Self {
        self.options.lean = true;
        self
    }

    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.options.populate.push(path.into());
        self
    }

    pub fn count(mut self) -> Self {
        self.options.count = true;
        self
    }

    pub(crate) fn single(mut self) -> Self {
        self.options.single = true;
        self
    }

    /// Translates the query into the backend request it will run.
    pub fn compile(&self) -> CompiledQuery {
        let config = self.model.config();
        let collection = self.options.count;

        match self.filter.get("id") {
            Some(Bson::Array(ids)) => CompiledQuery::MultiGet {
                request: MultiGetRequest {
                    index: config.index.clone(),
                    doc_type: config.doc_type.clone(),
                    ids: ids.iter().filter_map(id_string).collect(),
                },
                single: false,
            },
            Some(id) if id_string(id).is_some() => CompiledQuery::MultiGet {
                request: MultiGetRequest {
                    index: config.index.clone(),
                    doc_type: config.doc_type.clone(),
                    ids: id_string(id).into_iter().collect(),
                },
                single: !collection,
            },
            _ => CompiledQuery::Search {
                request: SearchRequest {
                    index: config.index.clone(),
                    doc_type: config.doc_type.clone(),
                    filter: self.filter.clone(),
                    sort: self.options.sort.clone(),
                    from: self.options.skip,
                    size: self.options.limit.unwrap_or(config.page_size),
                    fields: self.options.fields.clone(),
                },
                single: self.options.single && !collection,
            },
        }
    }

    /// Runs the query.
    ///
    /// # Errors
    ///
    /// Backend failures are forwarded; population failures are reported as
    /// [`ModelError::Population`](crate::error::ModelError::Population).
    pub async fn exec(self) -> ModelResult<QueryOutput> {
        let store = self.model.store()?;
        let backend = store.backend();

        let (hits, total, single) = match self.compile() {
            CompiledQuery::MultiGet { request, single } => {
                debug!(
                    model = self.model.name(),
                    index = request.index.as_str(),
                    ids = request.ids.len(),
                    "running multi-get"
                );
                trace!(body = %request.to_body(), "multi-get body");
                let hits = backend.multi_get(request).await?;
                let total = hits.len() as u64;
                (hits, total, single)
            }
            CompiledQuery::Search { request, single } => {
                debug!(
                    model = self.model.name(),
                    index = request.index.as_str(),
                    from = request.from,
                    size = request.size,
                    sort = request.sort.len(),
                    "running search"
                );
                trace!(body = %request.to_body(), "search body");
                let response = backend.search(request).await?;
                (response.hits, response.total, single)
            }
        };

        if self.options.count {
            return Ok(QueryOutput::Count(total));
        }

        if self.options.lean && self.options.populate.is_empty() {
            return Ok(if single {
                QueryOutput::Hit(hits.into_iter().next())
            } else {
                QueryOutput::Hits(hits)
            });
        }

        let mut results = Results::from_hits(&self.model, hits)?;
        for path in &self.options.populate {
            results.populate(path).await?;
        }

        Ok(if single {
            QueryOutput::Document(results.into_iter().next())
        } else {
            QueryOutput::Documents(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ModelConfig, schema::Schema};
    use bson::doc;
    use std::sync::{Arc, Weak};

    fn model() -> Model {
        let config = ModelConfig::builder("User").with_index("users").build();
        Model::new("User", Arc::new(Schema::new()), config, Weak::new()).expect("model")
    }

    #[test]
    fn sort_maps_are_normalized() {
        let query = model().find(doc! {}).sort(doc! {
            "a": "desc",
            "b": "descending",
            "c": -1,
            "d": "DESC",
            "e": 1,
            "f": -1.0,
        });

        let directions = query
            .options()
            .sort
            .iter()
            .map(|sort| sort.direction)
            .collect::<Vec<_>>();

        assert_eq!(
            directions,
            vec![
                SortDirection::Desc,
                SortDirection::Desc,
                SortDirection::Desc,
                SortDirection::Asc,
                SortDirection::Asc,
                SortDirection::Desc,
            ]
        );
    }

    #[test]
    fn searches_default_to_first_page() {
        match model().find(doc! { "name": "Alice" }).compile() {
            CompiledQuery::Search { request, single } => {
                assert!(!single);
                assert_eq!(request.index, "users");
                assert_eq!(request.doc_type, "User");
                assert_eq!(request.from, 0);
                assert_eq!(request.size, 10);
                assert_eq!(request.fields, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn modifiers_shape_the_search() {
        let compiled = model()
            .find(doc! {})
            .skip(5)
            .limit(2)
            .select(" name  age ")
            .compile();

        match compiled {
            CompiledQuery::Search { request, .. } => {
                assert_eq!(request.from, 5);
                assert_eq!(request.size, 2);
                assert_eq!(request.fields, Some(vec!["name".to_string(), "age".to_string()]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn identifier_filters_become_multi_gets() {
        match model().find_by_id("a").compile() {
            CompiledQuery::MultiGet { request, single } => {
                assert!(single);
                assert_eq!(request.ids, vec!["a".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }

        match model().find_by_id(vec!["a", "b"]).compile() {
            CompiledQuery::MultiGet { request, single } => {
                assert!(!single);
                assert_eq!(request.ids, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_identifiers_address_documents() {
        match model().find_by_id(7).compile() {
            CompiledQuery::MultiGet { request, single } => {
                assert!(single);
                assert_eq!(request.ids, vec!["7".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }

        match model().find_by_id(vec![Bson::Int64(7), Bson::from("b"), Bson::Double(8.0)]).compile() {
            CompiledQuery::MultiGet { request, single } => {
                assert!(!single);
                assert_eq!(request.ids, vec!["7".to_string(), "b".to_string(), "8".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn counts_are_never_single() {
        let compiled = model().find_by_id("a").count().compile();
        assert!(matches!(compiled, CompiledQuery::MultiGet { single: false, .. }));

        let compiled = model().find_one(doc! {}).count().compile();
        assert!(matches!(compiled, CompiledQuery::Search { single: false, .. }));
    }

    #[test]
    fn find_one_limits_to_a_single_hit() {
        match model().find_one(doc! { "name": "Alice" }).compile() {
            CompiledQuery::Search { request, single } => {
                assert!(single);
                assert_eq!(request.size, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
