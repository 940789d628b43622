//! Compiled type descriptors and the coercion/validation pipeline.
//!
//! [`SchemaType::dispatch`] turns a [`FieldSpec`] into a [`SchemaType`], picking the
//! first matching kind in this order:
//!
//! 1. an embedded [`Schema`] (a reference to another model's documents),
//! 2. an array literal, whose single element spec is dispatched recursively,
//! 3. a nested keyed object, each key dispatched recursively,
//! 4. a primitive type token or type name.
//!
//! A compiled descriptor holds no data and no location: the field path is passed to
//! every [`SchemaType::validate`] call, so one descriptor serves every document and
//! every array slot it is used for.

use bson::{Bson, DateTime, Document as BsonDocument};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Weak};
use tracing::trace;

use crate::{
    document::Document,
    error::{ModelError, ModelResult, RangeBound, ValidationError, ValidationErrorKind},
    live::{LiveArray, LiveObject},
    model::Model,
    path::FieldPath,
    schema::{Constraint, FieldRules, FieldSpec, GetterFn, Hook, Schema, SetterFn, TypeToken},
    store::StoreInner,
    value::{Value, same_value},
};

/// Largest distance from the epoch, in milliseconds, a date may have.
const MAX_DATE_MILLIS: f64 = 8.64e15;

/// The kind of value a field holds.
#[derive(Debug, Clone)]
pub enum TypeKind {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Mixed,
    /// `None` for untyped arrays, which store elements as given.
    Array(Option<Arc<SchemaType>>),
    Object(Arc<ObjectShape>),
    Reference(Arc<Schema>),
}

/// The compiled fields of an object-typed value or of a model's documents.
#[derive(Debug, Default)]
pub struct ObjectShape {
    fields: Vec<(String, SchemaType)>,
}

impl ObjectShape {
    /// Compiles keyed field specifications. `path` locates the object for error reporting.
    pub fn compile(fields: &[(String, FieldSpec)], path: &FieldPath) -> ModelResult<Self> {
        let fields = fields
            .iter()
            .map(|(name, spec)| -> ModelResult<(String, SchemaType)> {
                Ok((name.clone(), SchemaType::dispatch(spec, &path.key(name))?))
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<&SchemaType> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, ty)| ty)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), ty))
    }
}

/// A field type plus its options.
#[derive(Debug, Clone)]
pub struct SchemaType {
    kind: TypeKind,
    rules: FieldRules,
}

impl SchemaType {
    /// Selects and compiles the descriptor for a field specification.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownType`] with `path` when no kind matches, for
    /// example an unknown type name or options without a type.
    pub fn dispatch(spec: &FieldSpec, path: &FieldPath) -> ModelResult<Self> {
        match spec {
            FieldSpec::Options(options) => match &options.kind {
                Some(kind) => Ok(Self {
                    kind: Self::dispatch_kind(kind, path)?,
                    rules: options.rules.clone(),
                }),
                None => Err(ModelError::UnknownType { path: path.clone() }),
            },
            spec => Ok(Self {
                kind: Self::dispatch_kind(spec, path)?,
                rules: FieldRules::default(),
            }),
        }
    }

    fn dispatch_kind(spec: &FieldSpec, path: &FieldPath) -> ModelResult<TypeKind> {
        let kind = match spec {
            FieldSpec::Schema(schema) => TypeKind::Reference(Arc::clone(schema)),
            FieldSpec::Array(None) => TypeKind::Array(None),
            FieldSpec::Array(Some(element)) => {
                TypeKind::Array(Some(Arc::new(Self::dispatch(element, path)?)))
            }
            FieldSpec::Object(fields) => TypeKind::Object(Arc::new(ObjectShape::compile(fields, path)?)),
            FieldSpec::Type(token) => Self::primitive(*token),
            FieldSpec::Named(name) => TypeToken::from_name(name)
                .map(Self::primitive)
                .ok_or_else(|| ModelError::UnknownType { path: path.clone() })?,
            FieldSpec::Options(_) => return Err(ModelError::UnknownType { path: path.clone() }),
        };

        Ok(kind)
    }

    fn primitive(token: TypeToken) -> TypeKind {
        match token {
            TypeToken::String => TypeKind::String,
            TypeToken::Number => TypeKind::Number,
            TypeToken::Boolean => TypeKind::Boolean,
            TypeToken::Date => TypeKind::Date,
            TypeToken::ObjectId => TypeKind::ObjectId,
            TypeToken::Mixed => TypeKind::Mixed,
            TypeToken::Array => TypeKind::Array(None),
            TypeToken::Object => TypeKind::Object(Arc::new(ObjectShape::default())),
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    pub fn is_required(&self) -> bool {
        self.rules.is_required()
    }

    pub(crate) fn getter(&self) -> Option<&Hook<GetterFn>> {
        self.rules.get.as_ref()
    }

    pub(crate) fn setter(&self) -> Option<&Hook<SetterFn>> {
        self.rules.set.as_ref()
    }

    /// Coerces `raw` into this type and applies every constraint in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] carrying `path` (or a deeper path for nested
    /// values) on the first coercion or constraint failure.
    pub fn validate(&self, raw: Value, path: &FieldPath, store: &Weak<StoreInner>) -> ModelResult<Value> {
        let value = self.coerce(raw, path, store)?;
        let value = self.constrain(value, path)?;

        trace!(path = %path, "validated field");
        Ok(value)
    }

    /// Returns `raw` unchanged unless it is null, in which case the declared default is
    /// materialized and coerced. Containers and references always materialize.
    pub fn default(&self, raw: Value, path: &FieldPath, store: &Weak<StoreInner>) -> ModelResult<Value> {
        if !raw.is_null() {
            return Ok(raw);
        }

        if let Some(default) = &self.rules.default {
            return self.coerce(Value::from(default.materialize()), path, store);
        }

        match &self.kind {
            TypeKind::Array(element) => Ok(Value::Array(LiveArray::new(
                element.clone(),
                path.clone(),
                store.clone(),
            ))),
            TypeKind::Object(shape) => Ok(Value::Object(LiveObject::defaulted(
                Arc::clone(shape),
                path,
                store,
            )?)),
            TypeKind::Reference(schema) => {
                let model = resolve_model(schema, path, store)?;
                Ok(Value::from(Document::build(&model, BsonDocument::new(), path)?))
            }
            _ => Ok(Value::Null),
        }
    }

    fn coerce(&self, raw: Value, path: &FieldPath, store: &Weak<StoreInner>) -> ModelResult<Value> {
        let invalid = |kind| ModelError::from(ValidationError::new(path, kind));

        match &self.kind {
            TypeKind::String => coerce_string(&raw)
                .map(|text| Value::Scalar(Bson::String(text)))
                .ok_or_else(|| invalid(ValidationErrorKind::InvalidString)),
            TypeKind::Number => coerce_number(&raw)
                .map(|number| Value::Scalar(Bson::Double(number)))
                .ok_or_else(|| invalid(ValidationErrorKind::InvalidNumber)),
            TypeKind::Boolean => Ok(Value::Scalar(Bson::Boolean(truthy(&raw)))),
            TypeKind::Date => coerce_date(&raw)
                .map(|date| Value::Scalar(Bson::DateTime(date)))
                .ok_or_else(|| invalid(ValidationErrorKind::InvalidDate)),
            TypeKind::ObjectId | TypeKind::Mixed => {
                let mut value = raw;
                value.rebase(path);
                Ok(value)
            }
            TypeKind::Array(element) => match raw {
                Value::Array(source) => Ok(Value::Array(LiveArray::coerce(
                    element.clone(),
                    source,
                    path,
                    store,
                )?)),
                _ => Err(invalid(ValidationErrorKind::InvalidArray)),
            },
            TypeKind::Object(shape) => match raw {
                Value::Object(mut object) if Arc::ptr_eq(object.shape(), shape) => {
                    object.rebase(path);
                    Ok(Value::Object(object))
                }
                Value::Object(source) => {
                    let mut object = LiveObject::defaulted(Arc::clone(shape), path, store)?;
                    for (key, value) in source.into_entries() {
                        object.set(&key, value)?;
                    }
                    Ok(Value::Object(object))
                }
                _ => Err(invalid(ValidationErrorKind::InvalidObject)),
            },
            TypeKind::Reference(schema) => {
                let source = match raw {
                    Value::Object(object) => object.to_bson_document(),
                    Value::Document(document) => {
                        let model = resolve_model(schema, path, store)?;
                        if document.model().is(&model) {
                            let mut document = document;
                            document.rebase(path);
                            return Ok(Value::Document(document));
                        }
                        document.to_body()
                    }
                    _ => return Err(invalid(ValidationErrorKind::InvalidReference)),
                };

                let model = resolve_model(schema, path, store)?;
                Ok(Value::from(Document::build(&model, source, path)?))
            }
        }
    }

    fn constrain(&self, value: Value, path: &FieldPath) -> ModelResult<Value> {
        self.rules
            .constraints
            .iter()
            .try_fold(value, |value, constraint| apply_constraint(constraint, value, path))
    }
}

fn resolve_model(schema: &Arc<Schema>, path: &FieldPath, store: &Weak<StoreInner>) -> ModelResult<Model> {
    let store = store.upgrade().ok_or(ModelError::StoreClosed)?;

    store
        .model_for_schema(schema)
        .ok_or_else(|| ModelError::SchemaNotRegistered { path: path.clone() })
}

fn apply_constraint(constraint: &Constraint, value: Value, path: &FieldPath) -> ModelResult<Value> {
    let fail = |kind| Err(ModelError::from(ValidationError::new(path, kind)));

    match constraint {
        Constraint::Required if value.is_null() => fail(ValidationErrorKind::Required),
        Constraint::Min(min) => match value.as_f64() {
            Some(number) if number < *min => fail(ValidationErrorKind::Range(RangeBound::Min(*min))),
            _ => Ok(value),
        },
        Constraint::Max(max) => match value.as_f64() {
            Some(number) if number > *max => fail(ValidationErrorKind::Range(RangeBound::Max(*max))),
            _ => Ok(value),
        },
        Constraint::Enum(allowed) => {
            let current = value.to_bson();
            if allowed.iter().any(|candidate| same_value(candidate, &current)) {
                Ok(value)
            } else {
                fail(ValidationErrorKind::EnumMismatch)
            }
        }
        Constraint::Match(pattern) => match value.as_str() {
            Some(text) if !pattern.is_match(text) => {
                fail(ValidationErrorKind::PatternMismatch(pattern.as_str().to_string()))
            }
            _ => Ok(value),
        },
        Constraint::Lowercase => Ok(map_string(value, str::to_lowercase)),
        Constraint::Uppercase => Ok(map_string(value, str::to_uppercase)),
        Constraint::Trim => Ok(map_string(value, |text| text.trim().to_string())),
        Constraint::Required => Ok(value),
    }
}

fn map_string(value: Value, transform: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Scalar(Bson::String(text)) => Value::Scalar(Bson::String(transform(&text))),
        other => other,
    }
}

/// Renders a number the way it prints in JSON: integral values without a fraction.
pub(crate) fn format_number(number: f64) -> String {
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if number == 0.0 {
        return "0".to_string();
    }

    number.to_string()
}

fn coerce_string(raw: &Value) -> Option<String> {
    match raw {
        Value::Scalar(Bson::String(text)) => Some(text.clone()),
        Value::Scalar(Bson::Double(number)) => Some(format_number(*number)),
        Value::Scalar(Bson::Int32(number)) => Some(number.to_string()),
        Value::Scalar(Bson::Int64(number)) => Some(number.to_string()),
        Value::Scalar(Bson::Boolean(flag)) => Some(flag.to_string()),
        Value::Scalar(Bson::ObjectId(id)) => Some(id.to_hex()),
        _ => None,
    }
}

fn coerce_number(raw: &Value) -> Option<f64> {
    let number = match raw {
        Value::Scalar(Bson::Double(number)) => *number,
        Value::Scalar(Bson::Int32(number)) => *number as f64,
        Value::Scalar(Bson::Int64(number)) => *number as f64,
        Value::Scalar(Bson::String(text)) => parse_float(text)?,
        _ => return None,
    };

    (!number.is_nan()).then_some(number)
}

/// Parses the longest numeric prefix of `text`, skipping leading whitespace.
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    let sign_len = text.len() - unsigned.len();

    if sign_len > 1 {
        return None;
    }
    if unsigned.starts_with("Infinity") {
        return Some(if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let bytes = unsigned.as_bytes();
    let mut end = 0;
    let mut digits = 0;

    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent = end + 1;
        if exponent < bytes.len() && matches!(bytes[exponent], b'+' | b'-') {
            exponent += 1;
        }
        let start = exponent;
        while exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            exponent += 1;
        }
        if exponent > start {
            end = exponent;
        }
    }

    text[..sign_len + end].parse::<f64>().ok()
}

fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Scalar(Bson::Boolean(flag)) => *flag,
        Value::Scalar(Bson::Double(number)) => *number != 0.0 && !number.is_nan(),
        Value::Scalar(Bson::Int32(number)) => *number != 0,
        Value::Scalar(Bson::Int64(number)) => *number != 0,
        Value::Scalar(Bson::String(text)) => !text.is_empty(),
        Value::Scalar(Bson::Undefined) => false,
        _ => true,
    }
}

fn coerce_date(raw: &Value) -> Option<DateTime> {
    match raw {
        Value::Scalar(Bson::DateTime(date)) => Some(*date),
        Value::Scalar(Bson::Double(millis)) => date_from_millis(*millis),
        Value::Scalar(Bson::Int32(millis)) => date_from_millis(*millis as f64),
        Value::Scalar(Bson::Int64(millis)) => date_from_millis(*millis as f64),
        Value::Scalar(Bson::String(text)) => parse_date(text.trim()),
        _ => None,
    }
}

fn date_from_millis(millis: f64) -> Option<DateTime> {
    (millis.is_finite() && millis.abs() <= MAX_DATE_MILLIS)
        .then(|| DateTime::from_millis(millis.trunc() as i64))
}

/// Accepts RFC 3339 timestamps, a few common date-time layouts and plain dates.
/// Values without an offset are read as UTC.
fn parse_date(text: &str) -> Option<DateTime> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(DateTime::from_chrono(parsed.to_utc()));
    }

    const DATE_TIMES: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"];
    const DATES: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

    let naive = DATE_TIMES
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATES
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Some(DateTime::from_chrono(naive.and_utc()))
}
