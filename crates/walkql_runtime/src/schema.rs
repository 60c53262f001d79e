//! Schema definition and type registry.

use crate::error::ExecuteError;
use crate::executor::Context;
use crate::introspection;
use crate::document::OperationKind;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Picks the concrete object type name for a value of an abstract type.
pub type TypeResolverFn = Arc<dyn Fn(&Value, &Context) -> Option<String> + Send + Sync>;

/// Decides whether a type is visible to the current request.
pub type VisibilityFn = Arc<dyn Fn(&TypeDef, &Context) -> bool + Send + Sync>;

/// A GraphQL schema.
#[derive(Clone, Default)]
pub struct Schema {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, Arc<TypeDef>>,
    pub directives: IndexMap<String, DirectiveDefinition>,
    meta_fields: MetaFields,
    type_resolvers: FxHashMap<String, TypeResolverFn>,
    visibility: Option<VisibilityFn>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a type by name, ignoring visibility.
    pub fn get_type(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.types.get(name)
    }

    /// Returns all types.
    pub fn types(&self) -> impl Iterator<Item = (&String, &Arc<TypeDef>)> {
        self.types.iter()
    }

    /// Looks up a type by name as seen by the current request.
    pub fn lookup_type(&self, name: &str, ctx: &Context) -> Option<Arc<TypeDef>> {
        let ty = self.types.get(name)?;
        match &self.visibility {
            Some(visible) if !visible(ty, ctx) => None,
            _ => Some(Arc::clone(ty)),
        }
    }

    /// Gets a directive definition by name.
    pub fn directive(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directives.get(name)
    }

    /// Returns the root object type for an operation kind.
    pub fn root_type(&self, kind: OperationKind, ctx: &Context) -> Result<Arc<TypeDef>, ExecuteError> {
        let name = match kind {
            OperationKind::Query => &self.query_type,
            OperationKind::Mutation => &self.mutation_type,
            OperationKind::Subscription => &self.subscription_type,
        };
        let name = name.as_deref().ok_or(ExecuteError::MissingRootType(kind))?;
        self.lookup_type(name, ctx)
            .ok_or_else(|| ExecuteError::UnknownType(name.to_string()))
    }

    /// Returns true if `type_name` is the query root.
    pub fn is_query_root(&self, type_name: &str) -> bool {
        self.query_type.as_deref() == Some(type_name)
    }

    /// Replaces a forward-declared type reference with its definition.
    ///
    /// Wrappers are returned unchanged; only the outermost reference is
    /// resolved, so this must be applied again after each unwrap.
    pub fn resolve_late(&self, ty: &TypeRef, ctx: &Context) -> Result<TypeRef, ExecuteError> {
        match ty {
            TypeRef::Late(name) => self
                .lookup_type(name, ctx)
                .map(TypeRef::Named)
                .ok_or_else(|| ExecuteError::UnknownType(name.clone())),
            other => Ok(other.clone()),
        }
    }

    /// Returns the concrete object types a type may resolve to at runtime.
    pub fn possible_types(&self, ty: &TypeDef) -> Vec<Arc<TypeDef>> {
        match ty {
            TypeDef::Object(object) => self.get_type(&object.name).cloned().into_iter().collect(),
            TypeDef::Union(union) => union
                .members
                .iter()
                .filter_map(|name| self.get_type(name))
                .filter(|member| matches!(member.as_ref(), TypeDef::Object(_)))
                .cloned()
                .collect(),
            TypeDef::Interface(interface) => self
                .types
                .values()
                .filter(|candidate| match candidate.as_ref() {
                    TypeDef::Object(object) => object.implements.contains(&interface.name),
                    _ => false,
                })
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if `object_name` is among the possible types of `ty`.
    pub fn is_possible_type(&self, ty: &TypeDef, object_name: &str) -> bool {
        match ty {
            TypeDef::Object(object) => object.name == object_name,
            TypeDef::Union(union) => union.members.iter().any(|m| m == object_name),
            TypeDef::Interface(interface) => self.get_type(object_name).is_some_and(|candidate| {
                matches!(candidate.as_ref(), TypeDef::Object(object) if object.implements.contains(&interface.name))
            }),
            _ => false,
        }
    }

    /// Resolves the concrete object type of a value of an abstract type.
    ///
    /// Tries the type resolver registered for the abstract type, then the
    /// value's `__typename`, then the sole possible type.
    pub fn resolve_abstract_type(
        &self,
        ty: &TypeDef,
        value: &Value,
        ctx: &Context,
    ) -> Option<Arc<TypeDef>> {
        let name = self
            .type_resolvers
            .get(ty.name())
            .and_then(|resolve| resolve(value, ctx))
            .or_else(|| {
                value
                    .get("__typename")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .or_else(|| match self.possible_types(ty).as_slice() {
                [only] => Some(only.name().to_string()),
                _ => None,
            })?;

        let concrete = self.lookup_type(&name, ctx)?;
        let is_object = matches!(concrete.as_ref(), TypeDef::Object(_));
        (is_object && self.is_possible_type(ty, &name)).then_some(concrete)
    }

    /// Finds the definition of a field selected on an object type.
    ///
    /// Falls back to the query root's introspection entry points and then to
    /// `__typename`, which every object type has.
    pub fn field_definition<'a>(
        &'a self,
        owner: &'a TypeDef,
        name: &str,
    ) -> Option<FieldDefinition<'a>> {
        if let Some(field) = owner.fields().and_then(|fields| fields.get(name)) {
            return Some(FieldDefinition::Ordinary(field));
        }
        if self.is_query_root(owner.name()) {
            match name {
                "__schema" => {
                    return Some(FieldDefinition::Introspection(
                        MetaField::Schema,
                        &self.meta_fields.schema,
                    ))
                }
                "__type" => {
                    return Some(FieldDefinition::Introspection(
                        MetaField::Type,
                        &self.meta_fields.type_,
                    ))
                }
                _ => {}
            }
        }
        (name == "__typename").then(|| {
            FieldDefinition::Introspection(MetaField::Typename, &self.meta_fields.typename)
        })
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("subscription_type", &self.subscription_type)
            .field("type_count", &self.types.len())
            .field("directive_count", &self.directives.len())
            .field("type_resolvers", &self.type_resolvers.len())
            .field("has_visibility", &self.visibility.is_some())
            .finish()
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    /// Returns the type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(s) => &s.name,
            Self::Object(o) => &o.name,
            Self::Interface(i) => &i.name,
            Self::Union(u) => &u.name,
            Self::Enum(e) => &e.name,
            Self::InputObject(i) => &i.name,
        }
    }

    /// Returns the description.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => s.description.as_deref(),
            Self::Object(o) => o.description.as_deref(),
            Self::Interface(i) => i.description.as_deref(),
            Self::Union(u) => u.description.as_deref(),
            Self::Enum(e) => e.description.as_deref(),
            Self::InputObject(i) => i.description.as_deref(),
        }
    }

    /// Returns the kind as spelled by introspection.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "SCALAR",
            Self::Object(_) => "OBJECT",
            Self::Interface(_) => "INTERFACE",
            Self::Union(_) => "UNION",
            Self::Enum(_) => "ENUM",
            Self::InputObject(_) => "INPUT_OBJECT",
        }
    }

    /// Returns the output fields of object and interface types.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(o) => Some(&o.fields),
            Self::Interface(i) => Some(&i.fields),
            _ => None,
        }
    }

    /// Returns true for union and interface types.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Union(_) | Self::Interface(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

impl ScalarDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Object type definition.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Union type definition.
#[derive(Debug, Clone)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

impl UnionDef {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Enum type definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            values: values
                .into_iter()
                .map(|value| EnumValueDef {
                    name: value.into(),
                    description: None,
                    deprecated: false,
                    deprecation_reason: None,
                })
                .collect(),
        }
    }

    /// Returns true if `name` is one of the values.
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|value| value.name == name)
    }
}

/// Enum value definition.
#[derive(Debug, Clone)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

/// Input object type definition.
#[derive(Debug, Clone)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputFieldDef>,
}

impl InputObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
        }
    }

    /// Adds an input field.
    pub fn field(mut self, field: InputFieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

/// Values a field can ask to receive alongside its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldExtra {
    /// The selection node the field was requested with.
    AstNode,
    /// A collector for errors scoped to the field's path.
    Errors,
}

/// Field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputFieldDef>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
    pub extras: Vec<FieldExtra>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            deprecated: false,
            deprecation_reason: None,
            extras: Vec::new(),
        }
    }

    /// Adds an argument.
    pub fn argument(mut self, argument: InputFieldDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    /// Requests an extra value.
    pub fn extra(mut self, extra: FieldExtra) -> Self {
        self.extras.push(extra);
        self
    }

    /// Marks the field deprecated.
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_reason = Some(reason.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input field or argument definition.
#[derive(Debug, Clone)]
pub struct InputFieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<Value>,
}

impl InputFieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Type reference.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// A resolved named type.
    Named(Arc<TypeDef>),
    /// A forward-declared named type, resolved against the registry by name.
    Late(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// A reference to a named type, resolved when first inspected.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Late(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Shorthand for `NonNull(named(name))`.
    pub fn required(name: impl Into<String>) -> Self {
        Self::non_null(Self::named(name))
    }

    /// Returns true for non-null wrappers.
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns the innermost named type's name.
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(def) => def.name(),
            Self::Late(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(def) => f.write_str(def.name()),
            Self::Late(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Introspection fields the executor answers itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    /// `__schema`, query root only.
    Schema,
    /// `__type(name:)`, query root only.
    Type,
    /// `__typename`, every object type.
    Typename,
}

/// The definition a selected field resolved to.
#[derive(Debug, Clone, Copy)]
pub enum FieldDefinition<'a> {
    Ordinary(&'a FieldDef),
    Introspection(MetaField, &'a FieldDef),
}

impl<'a> FieldDefinition<'a> {
    /// Returns the underlying field definition.
    pub fn def(&self) -> &'a FieldDef {
        match self {
            Self::Ordinary(def) | Self::Introspection(_, def) => def,
        }
    }
}

#[derive(Debug, Clone)]
struct MetaFields {
    schema: FieldDef,
    type_: FieldDef,
    typename: FieldDef,
}

impl Default for MetaFields {
    fn default() -> Self {
        Self {
            schema: FieldDef::new("__schema", TypeRef::required("__Schema")),
            type_: FieldDef::new("__type", TypeRef::named("__Type"))
                .argument(InputFieldDef::new("name", TypeRef::required("String"))),
            typename: FieldDef::new("__typename", TypeRef::required("String")),
        }
    }
}

/// Directive definition.
#[derive(Debug, Clone)]
pub struct DirectiveDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: IndexMap<String, InputFieldDef>,
    pub locations: Vec<DirectiveLocation>,
    pub repeatable: bool,
}

impl DirectiveDefinition {
    pub fn new(name: impl Into<String>, locations: Vec<DirectiveLocation>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: IndexMap::new(),
            locations,
            repeatable: false,
        }
    }

    /// Adds an argument.
    pub fn argument(mut self, argument: InputFieldDef) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Directive location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveLocation {
    Query,
    Mutation,
    Subscription,
    Field,
    FragmentDefinition,
    FragmentSpread,
    InlineFragment,
    VariableDefinition,
    Schema,
    Scalar,
    Object,
    FieldDefinition,
    ArgumentDefinition,
    Interface,
    Union,
    Enum,
    EnumValue,
    InputObject,
    InputFieldDefinition,
}

/// Schema builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Creates a builder with the built-in scalars, directives and
    /// introspection types registered.
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in ["Int", "Float", "String", "Boolean", "ID"] {
            builder = builder.add_type(TypeDef::Scalar(ScalarDef {
                name: name.to_string(),
                description: Some(format!("Built-in {name} scalar")),
            }));
        }
        for directive in builtin_directives() {
            builder = builder.add_directive(directive);
        }
        for ty in introspection::types() {
            builder = builder.add_type(ty);
        }
        builder
    }

    /// Sets the query type.
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Adds a type.
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        self.schema
            .types
            .insert(type_def.name().to_string(), Arc::new(type_def));
        self
    }

    /// Adds a directive definition.
    pub fn add_directive(mut self, directive: DirectiveDefinition) -> Self {
        self.schema
            .directives
            .insert(directive.name.clone(), directive);
        self
    }

    /// Registers the runtime type resolver of an abstract type.
    pub fn type_resolver<F>(mut self, abstract_type: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Value, &Context) -> Option<String> + Send + Sync + 'static,
    {
        self.schema
            .type_resolvers
            .insert(abstract_type.into(), Arc::new(resolve));
        self
    }

    /// Sets the per-request type visibility check.
    pub fn visibility<F>(mut self, visible: F) -> Self
    where
        F: Fn(&TypeDef, &Context) -> bool + Send + Sync + 'static,
    {
        self.schema.visibility = Some(Arc::new(visible));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        self.schema
    }
}

fn builtin_directives() -> Vec<DirectiveDefinition> {
    let conditional = [
        DirectiveLocation::Field,
        DirectiveLocation::FragmentSpread,
        DirectiveLocation::InlineFragment,
    ];
    vec![
        DirectiveDefinition::new("skip", conditional.to_vec())
            .description("Directs the executor to skip this field or fragment when the `if` argument is true.")
            .argument(InputFieldDef::new("if", TypeRef::required("Boolean"))),
        DirectiveDefinition::new("include", conditional.to_vec())
            .description("Directs the executor to include this field or fragment only when the `if` argument is true.")
            .argument(InputFieldDef::new("if", TypeRef::required("Boolean"))),
        DirectiveDefinition::new(
            "deprecated",
            vec![DirectiveLocation::FieldDefinition, DirectiveLocation::EnumValue],
        )
        .argument(
            InputFieldDef::new("reason", TypeRef::named("String"))
                .default_value(Value::String("No longer supported".to_string())),
        ),
    ]
}
