//! Declarative document schemas.
//!
//! A [`Schema`] is an ordered list of named [`FieldSpec`]s together with the virtual
//! properties, methods and statics attached to documents of the model it is registered
//! under. Field specifications are plain data; they are compiled into
//! [`SchemaType`](crate::types::SchemaType) descriptors once, when the schema is
//! registered with a [`DocumentStore`](crate::store::DocumentStore).
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use regex::Regex;
//!
//! let schema = Schema::new()
//!     .field("name", FieldSpec::string().required().trim())
//!     .field("email", FieldSpec::string().lowercase().pattern(Regex::new(r"@")?))
//!     .field("age", FieldSpec::number().min(0.0).max(150.0))
//!     .field("tags", FieldSpec::array_of(FieldSpec::string()))
//!     .field("address", FieldSpec::object([
//!         ("street", FieldSpec::string()),
//!         ("city", FieldSpec::string().default("Berlin")),
//!     ]));
//! ```

use bson::Bson;
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use std::{collections::HashMap, fmt, future::Future, ops::Deref, sync::Arc};

use crate::{
    document::Document,
    error::ModelResult,
    model::Model,
    value::{Value, ValueMap},
};

pub type MethodFn = dyn Fn(&mut Document, &[Bson]) -> ModelResult<Value> + Send + Sync;
pub type StaticFn = dyn Fn(Model, Vec<Bson>) -> BoxFuture<'static, ModelResult<Value>> + Send + Sync;
pub type DefaultFn = dyn Fn() -> Bson + Send + Sync;
pub type GetterFn = dyn Fn(&ValueMap) -> Value + Send + Sync;
pub type SetterFn = dyn Fn(&mut ValueMap, Value) + Send + Sync;
pub type VirtualGetFn = dyn Fn(&Document) -> Value + Send + Sync;
pub type VirtualSetFn = dyn Fn(&mut Document, Value) -> ModelResult<()> + Send + Sync;

/// A shared, user-supplied callback.
pub struct Hook<F: ?Sized>(Arc<F>);

impl<F: ?Sized> Hook<F> {
    pub fn new(callback: Arc<F>) -> Self {
        Self(callback)
    }
}

impl<F: ?Sized> Clone for Hook<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> Deref for Hook<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook(..)")
    }
}

/// Primitive type tokens understood by the type dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeToken {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Array,
    Object,
    Mixed,
}

impl TypeToken {
    /// Resolves a type name such as `"String"` or `"number"`, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let token = match name.to_ascii_lowercase().as_str() {
            "string" => TypeToken::String,
            "number" => TypeToken::Number,
            "boolean" => TypeToken::Boolean,
            "date" => TypeToken::Date,
            "objectid" => TypeToken::ObjectId,
            "array" => TypeToken::Array,
            "object" => TypeToken::Object,
            "mixed" => TypeToken::Mixed,
            _ => return None,
        };

        Some(token)
    }
}

/// The value a field takes when it is absent.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Value(Bson),
    /// A generator invoked every time a default is materialized.
    Generator(Hook<DefaultFn>),
}

impl DefaultValue {
    pub fn materialize(&self) -> Bson {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Generator(generate) => generate(),
        }
    }
}

/// A validation step applied after coercion. Constraints run in the order they
/// were declared.
#[derive(Debug, Clone)]
pub enum Constraint {
    Required,
    Min(f64),
    Max(f64),
    Enum(Vec<Bson>),
    Match(Regex),
    Lowercase,
    Uppercase,
    Trim,
}

/// Options attached to a field besides its type.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub default: Option<DefaultValue>,
    pub constraints: Vec<Constraint>,
    pub get: Option<Hook<GetterFn>>,
    pub set: Option<Hook<SetterFn>>,
    /// Name of the model that identifiers stored in this field refer to.
    pub reference: Option<String>,
}

impl FieldRules {
    pub fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| matches!(constraint, Constraint::Required))
    }
}

/// A typed field together with its rules.
#[derive(Debug, Clone)]
pub struct FieldOptions {
    /// The field type. Must not itself be [`FieldSpec::Options`].
    pub kind: Option<FieldSpec>,
    pub rules: FieldRules,
}

/// Declaration of a single field.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    /// A primitive type token.
    Type(TypeToken),
    /// A type given by name, matched case-insensitively.
    Named(String),
    /// An embedded document of another registered model.
    Schema(Arc<Schema>),
    /// An array, optionally typed by a single element specification.
    Array(Option<Box<FieldSpec>>),
    /// A nested object with its own keyed fields.
    Object(Vec<(String, FieldSpec)>),
    /// A type with options.
    Options(Box<FieldOptions>),
}

impl FieldSpec {
    pub fn string() -> Self {
        FieldSpec::Type(TypeToken::String)
    }

    pub fn number() -> Self {
        FieldSpec::Type(TypeToken::Number)
    }

    pub fn boolean() -> Self {
        FieldSpec::Type(TypeToken::Boolean)
    }

    pub fn date() -> Self {
        FieldSpec::Type(TypeToken::Date)
    }

    pub fn object_id() -> Self {
        FieldSpec::Type(TypeToken::ObjectId)
    }

    pub fn mixed() -> Self {
        FieldSpec::Type(TypeToken::Mixed)
    }

    pub fn named(name: impl Into<String>) -> Self {
        FieldSpec::Named(name.into())
    }

    /// An untyped array; elements are stored as given.
    pub fn array() -> Self {
        FieldSpec::Array(None)
    }

    pub fn array_of(element: FieldSpec) -> Self {
        FieldSpec::Array(Some(Box::new(element)))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldSpec)>) -> Self {
        FieldSpec::Object(
            fields
                .into_iter()
                .map(|(name, spec)| (name.into(), spec))
                .collect(),
        )
    }

    pub fn schema(schema: impl Into<Arc<Schema>>) -> Self {
        FieldSpec::Schema(schema.into())
    }

    pub fn required(self) -> Self {
        self.constrain(Constraint::Required)
    }

    pub fn min(self, min: f64) -> Self {
        self.constrain(Constraint::Min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.constrain(Constraint::Max(max))
    }

    pub fn enum_values<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> Self {
        self.constrain(Constraint::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn pattern(self, pattern: Regex) -> Self {
        self.constrain(Constraint::Match(pattern))
    }

    pub fn lowercase(self) -> Self {
        self.constrain(Constraint::Lowercase)
    }

    pub fn uppercase(self) -> Self {
        self.constrain(Constraint::Uppercase)
    }

    pub fn trim(self) -> Self {
        self.constrain(Constraint::Trim)
    }

    pub fn default(self, value: impl Into<Bson>) -> Self {
        let value = DefaultValue::Value(value.into());
        self.with_rules(|rules| rules.default = Some(value))
    }

    pub fn default_with<F>(self, generate: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        let generate: Arc<DefaultFn> = Arc::new(generate);
        self.with_rules(|rules| rules.default = Some(DefaultValue::Generator(Hook(generate))))
    }

    /// Replaces reads of this field with a computed value over the sibling values.
    pub fn get<F>(self, getter: F) -> Self
    where
        F: Fn(&ValueMap) -> Value + Send + Sync + 'static,
    {
        let getter: Arc<GetterFn> = Arc::new(getter);
        self.with_rules(|rules| rules.get = Some(Hook(getter)))
    }

    /// Replaces writes to this field. The setter receives the raw, unvalidated value.
    pub fn set<F>(self, setter: F) -> Self
    where
        F: Fn(&mut ValueMap, Value) + Send + Sync + 'static,
    {
        let setter: Arc<SetterFn> = Arc::new(setter);
        self.with_rules(|rules| rules.set = Some(Hook(setter)))
    }

    /// Names the model used to resolve identifiers stored in this field.
    pub fn reference(self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.with_rules(|rules| rules.reference = Some(model))
    }

    fn constrain(self, constraint: Constraint) -> Self {
        self.with_rules(|rules| rules.constraints.push(constraint))
    }

    fn with_rules(self, apply: impl FnOnce(&mut FieldRules)) -> Self {
        let mut options = match self {
            FieldSpec::Options(options) => options,
            kind => Box::new(FieldOptions {
                kind: Some(kind),
                rules: FieldRules::default(),
            }),
        };

        apply(&mut options.rules);
        FieldSpec::Options(options)
    }
}

impl From<TypeToken> for FieldSpec {
    fn from(token: TypeToken) -> Self {
        FieldSpec::Type(token)
    }
}

impl From<Arc<Schema>> for FieldSpec {
    fn from(schema: Arc<Schema>) -> Self {
        FieldSpec::Schema(schema)
    }
}

/// A computed property exposed on documents but never persisted.
#[derive(Debug, Clone, Default)]
pub struct Virtual {
    get: Option<Hook<VirtualGetFn>>,
    set: Option<Hook<VirtualSetFn>>,
}

impl Virtual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        let getter: Arc<VirtualGetFn> = Arc::new(getter);
        self.get = Some(Hook(getter));
        self
    }

    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut Document, Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        let setter: Arc<VirtualSetFn> = Arc::new(setter);
        self.set = Some(Hook(setter));
        self
    }

    pub fn getter(&self) -> Option<&Hook<VirtualGetFn>> {
        self.get.as_ref()
    }

    pub fn setter(&self) -> Option<&Hook<VirtualSetFn>> {
        self.set.as_ref()
    }
}

/// The declared shape of a model's documents.
#[derive(Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
    virtuals: Vec<(String, Virtual)>,
    methods: HashMap<String, Hook<MethodFn>>,
    statics: HashMap<String, Hook<StaticFn>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field, replacing any earlier declaration of the same name.
    pub fn field(mut self, name: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        self.insert_field(name.into(), spec.into());
        self
    }

    /// Adds fields to an existing schema.
    ///
    /// Changes made after the schema has been registered do not affect the model it
    /// was registered under; the model keeps the descriptors compiled at that time.
    pub fn add<K: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = (K, FieldSpec)>,
    ) -> &mut Self {
        for (name, spec) in fields {
            self.insert_field(name.into(), spec);
        }
        self
    }

    pub fn virtual_field(mut self, name: impl Into<String>, property: Virtual) -> Self {
        let name = name.into();
        self.virtuals.retain(|(existing, _)| *existing != name);
        self.virtuals.push((name, property));
        self
    }

    /// Attaches a method callable on documents through [`Document::call`].
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut Document, &[Bson]) -> ModelResult<Value> + Send + Sync + 'static,
    {
        let method: Arc<MethodFn> = Arc::new(method);
        self.methods.insert(name.into(), Hook(method));
        self
    }

    /// Attaches a static callable on the model through [`Model::call`].
    pub fn static_fn<F, Fut>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Model, Vec<Bson>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<Value>> + Send + 'static,
    {
        let function: Arc<StaticFn> = Arc::new(move |model, args| function(model, args).boxed());
        self.statics.insert(name.into(), Hook(function));
        self
    }

    pub fn fields(&self) -> &[(String, FieldSpec)] {
        &self.fields
    }

    pub fn virtuals(&self) -> impl Iterator<Item = (&str, &Virtual)> {
        self.virtuals
            .iter()
            .map(|(name, property)| (name.as_str(), property))
    }

    pub fn virtual_named(&self, name: &str) -> Option<&Virtual> {
        self.virtuals
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, property)| property)
    }

    pub fn method_named(&self, name: &str) -> Option<&Hook<MethodFn>> {
        self.methods.get(name)
    }

    pub fn static_named(&self, name: &str) -> Option<&Hook<StaticFn>> {
        self.statics.get(name)
    }

    fn insert_field(&mut self, name: String, spec: FieldSpec) {
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = spec,
            None => self.fields.push((name, spec)),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("virtuals", &self.virtuals.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .finish()
    }
}
