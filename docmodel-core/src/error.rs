//! Error types and result types for the modeling layer and its backends.
//!
//! Two layers of errors exist:
//!
//! - [`DocumentStoreError`] is raised by [`StoreBackend`](crate::backend::StoreBackend)
//!   implementations and passed through untouched by the modeling layer.
//! - [`ModelError`] is raised by schemas, documents, queries and population. Validation
//!   failures carry the full path of the offending field, see [`ValidationError`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

use crate::path::FieldPath;

/// Represents all possible errors that can occur when talking to a storage backend.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found.
    /// The first argument is the document ID, the second is the index name.
    #[error("Document not found {0} in index {1}")]
    DocumentNotFound(String, String),
    /// An update carried a version token that no longer matches the stored document.
    #[error("Version conflict on document {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: i64,
        actual: i64,
    },
    /// The payload handed to the backend has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for backend operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// The bound violated by a `min`/`max` constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeBound {
    Min(f64),
    Max(f64),
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Min(min) => write!(f, "Expected value to be greater than {min}."),
            RangeBound::Max(max) => write!(f, "Expected value to be less than {max}."),
        }
    }
}

/// What went wrong while coercing or constraining a single field value.
///
/// The first six variants are coercion failures, the rest are constraint failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    #[error("Not a valid string.")]
    InvalidString,
    #[error("Not a number.")]
    InvalidNumber,
    #[error("Invalid time value.")]
    InvalidDate,
    #[error("Not a valid array.")]
    InvalidArray,
    #[error("Not a valid object.")]
    InvalidObject,
    #[error("Not an object. Unable to turn into a model.")]
    InvalidReference,
    #[error("Undefined property, value required.")]
    Required,
    #[error("{0}")]
    Range(RangeBound),
    #[error("Expected enum value not found.")]
    EnumMismatch,
    #[error("Value does not match pattern {0}.")]
    PatternMismatch(String),
}

/// A coercion or constraint failure annotated with the path of the offending field,
/// e.g. `items[2].amount`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error ({path}): {kind}")]
pub struct ValidationError {
    pub path: FieldPath,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: &FieldPath, kind: ValidationErrorKind) -> Self {
        Self { path: path.clone(), kind }
    }
}

/// Represents all errors raised by the modeling layer.
#[derive(Error, Debug)]
pub enum ModelError {
    /// No schema type matches the field specification at the given path.
    #[error("Unknown schema type at {path}")]
    UnknownType { path: FieldPath },
    /// A value failed coercion or one of its declared constraints.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A model was looked up by a name that was never registered.
    #[error("Model not registered: {0}")]
    ModelNotRegistered(String),
    /// A model name was registered twice.
    #[error("Model already registered: {0}")]
    ModelAlreadyRegistered(String),
    /// A reference field points at a schema no registered model uses.
    #[error("No model matching the schema at {path} was found")]
    SchemaNotRegistered { path: FieldPath },
    /// A persistence operation that needs an identifier was called on an unsaved document.
    #[error("Cannot {0}: no ID specified.")]
    MissingIdentifier(&'static str),
    /// A reference could not be fetched while populating `path`.
    #[error("Failed to populate {path}: {source}")]
    Population {
        path: String,
        #[source]
        source: Box<ModelError>,
    },
    /// A named schema method or static does not exist.
    #[error("No method named {0}")]
    UnknownMethod(String),
    /// The requested option combination is not supported.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// The document store backing a model has been dropped.
    #[error("Document store has been shut down")]
    StoreClosed,
    /// An error forwarded verbatim from the storage backend.
    #[error(transparent)]
    Backend(#[from] DocumentStoreError),
}

/// A specialized `Result` type for modeling operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// Returns the validation failure wrapped by this error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ModelError::Validation(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn population(path: &str, source: ModelError) -> Self {
        ModelError::Population {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Backend(err.into())
    }
}

impl From<SerdeJsonError> for ModelError {
    fn from(err: SerdeJsonError) -> Self {
        ModelError::Backend(err.into())
    }
}
