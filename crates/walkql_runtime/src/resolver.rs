//! Resolver system for walkql.
//!
//! This module provides the resolver trait and infrastructure for field
//! resolution, object authorization and custom scalar coercion.

use crate::document::Field;
use crate::executor::Context;
use crate::introspection;
use crate::result::SharedTree;
use crate::scheduler::Resolution;
use crate::schema::{ObjectDef, Schema};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use walkql_core::{ExecutionError, Pos, ResponsePath};

/// A settled field value.
pub enum FieldValue {
    /// An ordinary value; `Value::Null` is the null result.
    Value(Value),
    /// A list whose elements settle independently.
    List(Vec<Resolution>),
    /// A single application error.
    Error(ExecutionError),
    /// Several application errors.
    Errors(Vec<ExecutionError>),
    /// Write nothing for this field.
    Skip,
}

impl FieldValue {
    /// The null value.
    pub fn null() -> Self {
        Self::Value(Value::Null)
    }

    /// A list of independently settling elements.
    pub fn list<I, R>(items: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Resolution>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ExecutionError> for FieldValue {
    fn from(error: ExecutionError) -> Self {
        Self::Error(error)
    }
}

impl From<ResolverResult> for FieldValue {
    fn from(result: ResolverResult) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Error(error.into()),
        }
    }
}

impl Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::List(items) => f.debug_tuple("List").field(&items.len()).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Self::Errors(errors) => f.debug_tuple("Errors").field(errors).finish(),
            Self::Skip => f.write_str("Skip"),
        }
    }
}

/// Reports errors for one field while its resolver still returns data.
#[derive(Clone)]
pub struct ErrorCollector {
    path: ResponsePath,
    position: Option<Pos>,
    tree: SharedTree,
}

impl ErrorCollector {
    pub(crate) fn new(path: ResponsePath, position: Option<Pos>, tree: SharedTree) -> Self {
        Self {
            path,
            position,
            tree,
        }
    }

    /// Records an error, attaching the field's path and location if unset.
    pub fn push(&self, mut error: ExecutionError) {
        error.fill_path(&self.path);
        error.fill_location(self.position);
        self.tree.lock().push_error(error);
    }

    /// The path errors are attached to.
    pub fn path(&self) -> &ResponsePath {
        &self.path
    }
}

impl Debug for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCollector")
            .field("path", &self.path.to_string())
            .finish()
    }
}

/// Arguments passed to a resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    args: IndexMap<String, Value>,
    node: Option<Arc<Field>>,
    errors: Option<ErrorCollector>,
}

impl ResolverArgs {
    /// Creates new resolver args.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates resolver args from a list of (name, value) pairs.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self {
            args: pairs.into_iter().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn with_extras(
        args: IndexMap<String, Value>,
        node: Option<Arc<Field>>,
        errors: Option<ErrorCollector>,
    ) -> Self {
        Self { args, node, errors }
    }

    /// Gets an argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a required argument, returning an error if not found.
    pub fn require<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        self.args
            .get(name)
            .ok_or_else(|| ResolverError::MissingArgument(name.to_string()))
            .and_then(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ResolverError::ArgumentParseError(name.to_string(), e.to_string()))
            })
    }

    /// Returns all arguments.
    pub fn all(&self) -> &IndexMap<String, Value> {
        &self.args
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Sets an argument.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }

    /// The originating selection node, for fields declaring `FieldExtra::AstNode`.
    pub fn node(&self) -> Option<&Arc<Field>> {
        self.node.as_ref()
    }

    /// The path-scoped error collector, for fields declaring `FieldExtra::Errors`.
    pub fn errors(&self) -> Option<&ErrorCollector> {
        self.errors.as_ref()
    }
}

/// Info about the field being resolved.
#[derive(Debug, Clone)]
pub struct ResolverInfo {
    /// The field name being resolved.
    pub field_name: String,

    /// The return type, as written in the schema.
    pub return_type: String,

    /// The parent type name.
    pub parent_type: String,

    /// Path to this field.
    pub path: ResponsePath,

    /// The schema being executed against.
    pub schema: Option<Arc<Schema>>,
}

impl ResolverInfo {
    /// Creates new resolver info.
    pub fn new(field_name: impl Into<String>, parent_type: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            return_type: String::new(),
            parent_type: parent_type.into(),
            path: ResponsePath::root(),
            schema: None,
        }
    }

    /// Sets the return type.
    pub fn with_return_type(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    /// Sets the path.
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = path;
        self
    }

    /// Sets the schema.
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Result type for resolvers.
pub type ResolverResult = Result<Value, ResolverError>;

/// Error from a resolver.
#[derive(Error, Debug, Clone)]
pub enum ResolverError {
    /// Field not found.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Missing required argument.
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Argument parse error.
    #[error("Failed to parse argument '{0}': {1}")]
    ArgumentParseError(String, String),

    /// Custom error.
    #[error("{0}")]
    Custom(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ResolverError> for ExecutionError {
    fn from(error: ResolverError) -> Self {
        ExecutionError::new(error.to_string())
    }
}

/// Trait for field resolvers.
pub trait Resolver: Send + Sync {
    /// Resolves a field value, now or later.
    fn resolve(
        &self,
        parent: &Value,
        args: ResolverArgs,
        ctx: &Context,
        info: &ResolverInfo,
    ) -> Resolution;
}

/// A boxed resolver.
pub type BoxedResolver = Box<dyn Resolver>;

/// A sync resolver function.
pub type SyncResolverFn =
    Arc<dyn Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> Resolution + Send + Sync>;

/// A wrapper for sync resolver functions.
pub struct FnResolver {
    func: SyncResolverFn,
}

impl FnResolver {
    /// Creates a resolver from a function returning a plain result.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        Self::from_resolution(move |parent, args, ctx, info| f(parent, args, ctx, info).into())
    }

    /// Creates a resolver from a function returning a [`Resolution`].
    pub fn from_resolution<F>(f: F) -> Self
    where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> Resolution
            + Send
            + Sync
            + 'static,
    {
        Self { func: Arc::new(f) }
    }
}

impl Resolver for FnResolver {
    fn resolve(
        &self,
        parent: &Value,
        args: ResolverArgs,
        ctx: &Context,
        info: &ResolverInfo,
    ) -> Resolution {
        (self.func)(parent, &args, ctx, info)
    }
}

/// An async resolver function type.
pub type AsyncResolverFn = Arc<
    dyn Fn(Value, ResolverArgs, Context, ResolverInfo) -> Resolution + Send + Sync,
>;

/// A wrapper for async resolver functions.
pub struct AsyncFnResolver {
    func: AsyncResolverFn,
}

impl AsyncFnResolver {
    /// Creates a new async function resolver.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, ResolverArgs, Context, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |parent, args, ctx, info| {
                let fut = f(parent, args, ctx, info);
                Resolution::pending(async move { FieldValue::from(fut.await) })
            }),
        }
    }
}

impl Resolver for AsyncFnResolver {
    fn resolve(
        &self,
        parent: &Value,
        args: ResolverArgs,
        ctx: &Context,
        info: &ResolverInfo,
    ) -> Resolution {
        (self.func)(parent.clone(), args, ctx.clone(), info.clone())
    }
}

/// Default resolver that accesses properties from the parent object.
pub struct DefaultResolver;

impl Resolver for DefaultResolver {
    fn resolve(
        &self,
        parent: &Value,
        _args: ResolverArgs,
        _ctx: &Context,
        info: &ResolverInfo,
    ) -> Resolution {
        let field_name = &info.field_name;
        let result = match parent {
            Value::Object(map) => match map.get(field_name) {
                Some(value) => Ok(value.clone()),
                None => Ok(map
                    .get(&to_snake_case(field_name))
                    .cloned()
                    .unwrap_or(Value::Null)),
            },
            Value::Null => Ok(Value::Null),
            _ => Err(ResolverError::FieldNotFound(field_name.clone())),
        };
        result.into()
    }
}

/// Converts camelCase to snake_case.
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Decides whether a resolved object may be exposed.
///
/// Returning null hides the object; returning an error reports one. Either
/// way the outcome goes through the same null handling as a resolver result.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, object_type: &ObjectDef, value: Value, ctx: &Context) -> Resolution;
}

impl<F> Authorizer for F
where
    F: Fn(&ObjectDef, Value, &Context) -> Resolution + Send + Sync,
{
    fn authorize(&self, object_type: &ObjectDef, value: Value, ctx: &Context) -> Resolution {
        self(object_type, value, ctx)
    }
}

/// Serializes a custom scalar's value.
pub type ScalarCoercer = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Storage for resolvers organized by type and field.
pub struct ResolverMap {
    /// Resolvers indexed by "TypeName.fieldName".
    resolvers: HashMap<String, BoxedResolver>,

    /// Default resolver for unregistered fields.
    default_resolver: Option<BoxedResolver>,

    /// Object authorizers indexed by type name.
    authorizers: HashMap<String, Box<dyn Authorizer>>,

    /// Custom scalar coercers indexed by scalar name.
    scalars: HashMap<String, ScalarCoercer>,
}

impl Default for ResolverMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverMap {
    /// Creates a resolver map with the property resolver as default and the
    /// introspection resolvers installed.
    pub fn new() -> Self {
        let mut map = Self {
            resolvers: HashMap::new(),
            default_resolver: Some(Box::new(DefaultResolver)),
            authorizers: HashMap::new(),
            scalars: HashMap::new(),
        };
        introspection::install(&mut map);
        map
    }

    /// Registers a resolver for a specific type and field.
    pub fn register<R: Resolver + 'static>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: R,
    ) {
        let key = format!("{}.{}", type_name.into(), field_name.into());
        self.resolvers.insert(key, Box::new(resolver));
    }

    /// Registers a sync function as a resolver.
    pub fn register_fn<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> ResolverResult
            + Send
            + Sync
            + 'static,
    {
        self.register(type_name, field_name, FnResolver::new(f));
    }

    /// Registers a function that returns a [`Resolution`] directly.
    ///
    /// Use this for deferred list elements, error lists or skipping a field.
    pub fn register_resolution<F>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&Value, &ResolverArgs, &Context, &ResolverInfo) -> Resolution
            + Send
            + Sync
            + 'static,
    {
        self.register(type_name, field_name, FnResolver::from_resolution(f));
    }

    /// Registers an async function as a resolver.
    pub fn register_async<F, Fut>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) where
        F: Fn(Value, ResolverArgs, Context, ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        self.register(type_name, field_name, AsyncFnResolver::new(f));
    }

    /// Gets a resolver for a type and field.
    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&dyn Resolver> {
        let key = format!("{}.{}", type_name, field_name);
        self.resolvers
            .get(&key)
            .map(|r| r.as_ref())
            .or(self.default_resolver.as_ref().map(|r| r.as_ref()))
    }

    /// Sets the default resolver.
    pub fn set_default<R: Resolver + 'static>(&mut self, resolver: R) {
        self.default_resolver = Some(Box::new(resolver));
    }

    /// Removes the default resolver.
    pub fn remove_default(&mut self) {
        self.default_resolver = None;
    }

    /// Registers an authorizer for an object type.
    pub fn register_authorizer<A: Authorizer + 'static>(
        &mut self,
        type_name: impl Into<String>,
        authorizer: A,
    ) {
        self.authorizers
            .insert(type_name.into(), Box::new(authorizer));
    }

    /// Authorizes a value about to be completed as `object_type`.
    pub fn authorize(&self, object_type: &ObjectDef, value: Value, ctx: &Context) -> Resolution {
        match self.authorizers.get(&object_type.name) {
            Some(authorizer) => authorizer.authorize(object_type, value, ctx),
            None => Resolution::ready(value),
        }
    }

    /// Registers the serializer of a custom scalar.
    pub fn register_scalar<F>(&mut self, scalar_name: impl Into<String>, coerce: F)
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.scalars.insert(scalar_name.into(), Arc::new(coerce));
    }

    /// Gets the serializer of a custom scalar.
    pub fn scalar(&self, scalar_name: &str) -> Option<&ScalarCoercer> {
        self.scalars.get(scalar_name)
    }
}

impl Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMap")
            .field("resolver_count", &self.resolvers.len())
            .field("has_default", &self.default_resolver.is_some())
            .field("authorizer_count", &self.authorizers.len())
            .field("scalar_count", &self.scalars.len())
            .finish()
    }
}
