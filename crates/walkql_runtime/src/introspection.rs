//! Schema introspection.
//!
//! The `__*` types are ordinary object types whose values are JSON
//! descriptions of the schema. Most of their fields are read straight off
//! that JSON; the collection fields of `__Type` are looked up in the schema
//! when selected.

use crate::executor::Context;
use crate::resolver::{ResolverArgs, ResolverInfo, ResolverMap};
use crate::scheduler::Resolution;
use crate::schema::{
    DirectiveDefinition, EnumDef, EnumValueDef, FieldDef, InputFieldDef, MetaField, ObjectDef,
    Schema, TypeDef, TypeRef,
};
use serde_json::{json, Value};
use walkql_core::ExecutionError;

const TYPE_KINDS: [&str; 8] = [
    "SCALAR",
    "OBJECT",
    "INTERFACE",
    "UNION",
    "ENUM",
    "INPUT_OBJECT",
    "LIST",
    "NON_NULL",
];

const DIRECTIVE_LOCATIONS: [&str; 19] = [
    "QUERY",
    "MUTATION",
    "SUBSCRIPTION",
    "FIELD",
    "FRAGMENT_DEFINITION",
    "FRAGMENT_SPREAD",
    "INLINE_FRAGMENT",
    "VARIABLE_DEFINITION",
    "SCHEMA",
    "SCALAR",
    "OBJECT",
    "FIELD_DEFINITION",
    "ARGUMENT_DEFINITION",
    "INTERFACE",
    "UNION",
    "ENUM",
    "ENUM_VALUE",
    "INPUT_OBJECT",
    "INPUT_FIELD_DEFINITION",
];

fn object(name: &str, fields: Vec<FieldDef>) -> TypeDef {
    TypeDef::Object(fields.into_iter().fold(ObjectDef::new(name), ObjectDef::field))
}

fn non_null_list(name: &str) -> TypeRef {
    TypeRef::non_null(TypeRef::list(TypeRef::required(name)))
}

fn nullable_list(name: &str) -> TypeRef {
    TypeRef::list(TypeRef::required(name))
}

fn include_deprecated() -> InputFieldDef {
    InputFieldDef::new("includeDeprecated", TypeRef::named("Boolean")).default_value(json!(false))
}

/// The introspection types every schema carries.
pub fn types() -> Vec<TypeDef> {
    vec![
        object(
            "__Schema",
            vec![
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("types", non_null_list("__Type")),
                FieldDef::new("queryType", TypeRef::required("__Type")),
                FieldDef::new("mutationType", TypeRef::named("__Type")),
                FieldDef::new("subscriptionType", TypeRef::named("__Type")),
                FieldDef::new("directives", non_null_list("__Directive")),
            ],
        ),
        object(
            "__Type",
            vec![
                FieldDef::new("kind", TypeRef::required("__TypeKind")),
                FieldDef::new("name", TypeRef::named("String")),
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("specifiedByURL", TypeRef::named("String")),
                FieldDef::new("fields", nullable_list("__Field")).argument(include_deprecated()),
                FieldDef::new("interfaces", nullable_list("__Type")),
                FieldDef::new("possibleTypes", nullable_list("__Type")),
                FieldDef::new("enumValues", nullable_list("__EnumValue"))
                    .argument(include_deprecated()),
                FieldDef::new("inputFields", nullable_list("__InputValue")),
                FieldDef::new("ofType", TypeRef::named("__Type")),
            ],
        ),
        object(
            "__Field",
            vec![
                FieldDef::new("name", TypeRef::required("String")),
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("args", non_null_list("__InputValue")),
                FieldDef::new("type", TypeRef::required("__Type")),
                FieldDef::new("isDeprecated", TypeRef::required("Boolean")),
                FieldDef::new("deprecationReason", TypeRef::named("String")),
            ],
        ),
        object(
            "__InputValue",
            vec![
                FieldDef::new("name", TypeRef::required("String")),
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("type", TypeRef::required("__Type")),
                FieldDef::new("defaultValue", TypeRef::named("String")),
            ],
        ),
        object(
            "__EnumValue",
            vec![
                FieldDef::new("name", TypeRef::required("String")),
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("isDeprecated", TypeRef::required("Boolean")),
                FieldDef::new("deprecationReason", TypeRef::named("String")),
            ],
        ),
        object(
            "__Directive",
            vec![
                FieldDef::new("name", TypeRef::required("String")),
                FieldDef::new("description", TypeRef::named("String")),
                FieldDef::new("isRepeatable", TypeRef::required("Boolean")),
                FieldDef::new("locations", non_null_list("__DirectiveLocation")),
                FieldDef::new("args", non_null_list("__InputValue")),
            ],
        ),
        TypeDef::Enum(EnumDef::new("__TypeKind", TYPE_KINDS)),
        TypeDef::Enum(EnumDef::new("__DirectiveLocation", DIRECTIVE_LOCATIONS)),
    ]
}

/// Resolves `__typename`, `__schema` and `__type`.
pub(crate) fn resolve_meta(
    meta: MetaField,
    schema: &Schema,
    object_type: &TypeDef,
    args: &ResolverArgs,
    ctx: &Context,
    enabled: bool,
) -> Resolution {
    match meta {
        MetaField::Typename => Resolution::ready(Value::String(object_type.name().to_string())),
        _ if !enabled => Resolution::ready(
            ExecutionError::new("GraphQL introspection is not allowed")
                .with_code("INTROSPECTION_DISABLED"),
        ),
        MetaField::Schema => Resolution::ready(schema_json(schema, ctx)),
        MetaField::Type => {
            let ty = args
                .get("name")
                .and_then(Value::as_str)
                .and_then(|name| schema.lookup_type(name, ctx));
            Resolution::ready(ty.map_or(Value::Null, |ty| named_type_json(&ty)))
        }
    }
}

/// Installs the resolvers of the `__Type` collection fields.
pub(crate) fn install(map: &mut ResolverMap) {
    map.register_fn("__Type", "fields", |parent, args, ctx, info| {
        let include_deprecated = args.get_as::<bool>("includeDeprecated").unwrap_or(false);
        Ok(with_type(parent, ctx, info, |schema, ty| {
            let fields = ty.fields()?;
            Some(
                fields
                    .values()
                    .filter(|field| include_deprecated || !field.deprecated)
                    .map(|field| field_json(schema, field))
                    .collect(),
            )
        }))
    });

    map.register_fn("__Type", "interfaces", |parent, _args, ctx, info| {
        Ok(with_type(parent, ctx, info, |schema, ty| {
            let implements = match ty {
                TypeDef::Object(object) => &object.implements,
                TypeDef::Interface(interface) => &interface.implements,
                _ => return None,
            };
            Some(
                implements
                    .iter()
                    .filter_map(|name| schema.lookup_type(name, ctx))
                    .map(|interface| named_type_json(&interface))
                    .collect(),
            )
        }))
    });

    map.register_fn("__Type", "possibleTypes", |parent, _args, ctx, info| {
        Ok(with_type(parent, ctx, info, |schema, ty| {
            ty.is_abstract().then(|| {
                schema
                    .possible_types(ty)
                    .iter()
                    .filter(|candidate| schema.lookup_type(candidate.name(), ctx).is_some())
                    .map(|candidate| named_type_json(candidate))
                    .collect()
            })
        }))
    });

    map.register_fn("__Type", "enumValues", |parent, args, ctx, info| {
        let include_deprecated = args.get_as::<bool>("includeDeprecated").unwrap_or(false);
        Ok(with_type(parent, ctx, info, |_schema, ty| match ty {
            TypeDef::Enum(definition) => Some(
                definition
                    .values
                    .iter()
                    .filter(|value| include_deprecated || !value.deprecated)
                    .map(enum_value_json)
                    .collect(),
            ),
            _ => None,
        }))
    });

    map.register_fn("__Type", "inputFields", |parent, _args, ctx, info| {
        Ok(with_type(parent, ctx, info, |schema, ty| match ty {
            TypeDef::InputObject(input) => Some(
                input
                    .fields
                    .values()
                    .map(|field| input_value_json(schema, field))
                    .collect(),
            ),
            _ => None,
        }))
    });
}

/// Runs `describe` against the named type a `__Type` value stands for.
fn with_type<F>(parent: &Value, ctx: &Context, info: &ResolverInfo, describe: F) -> Value
where
    F: FnOnce(&Schema, &TypeDef) -> Option<Vec<Value>>,
{
    let (Some(schema), Some(name)) = (
        info.schema.as_deref(),
        parent.get("name").and_then(Value::as_str),
    ) else {
        return Value::Null;
    };
    schema
        .lookup_type(name, ctx)
        .and_then(|ty| describe(schema, &ty))
        .map_or(Value::Null, Value::Array)
}

fn schema_json(schema: &Schema, ctx: &Context) -> Value {
    let root = |name: &Option<String>| {
        name.as_deref()
            .and_then(|name| schema.lookup_type(name, ctx))
            .map_or(Value::Null, |ty| named_type_json(&ty))
    };
    json!({
        "description": null,
        "types": schema
            .types()
            .filter_map(|(name, _)| schema.lookup_type(name, ctx))
            .map(|ty| named_type_json(&ty))
            .collect::<Vec<_>>(),
        "queryType": root(&schema.query_type),
        "mutationType": root(&schema.mutation_type),
        "subscriptionType": root(&schema.subscription_type),
        "directives": schema
            .directives
            .values()
            .map(|directive| directive_json(schema, directive))
            .collect::<Vec<_>>(),
    })
}

fn named_type_json(ty: &TypeDef) -> Value {
    json!({
        "kind": ty.kind(),
        "name": ty.name(),
        "description": ty.description(),
        "ofType": null,
    })
}

fn type_ref_json(schema: &Schema, ty: &TypeRef) -> Value {
    let (kind, inner) = match ty {
        TypeRef::Named(definition) => return named_type_json(definition),
        TypeRef::Late(name) => {
            return match schema.get_type(name) {
                Some(definition) => named_type_json(definition),
                None => json!({"kind": null, "name": name, "description": null, "ofType": null}),
            }
        }
        TypeRef::List(inner) => ("LIST", inner),
        TypeRef::NonNull(inner) => ("NON_NULL", inner),
    };
    json!({
        "kind": kind,
        "name": null,
        "description": null,
        "ofType": type_ref_json(schema, inner),
    })
}

fn field_json(schema: &Schema, field: &FieldDef) -> Value {
    json!({
        "name": field.name,
        "description": field.description,
        "args": field
            .arguments
            .values()
            .map(|arg| input_value_json(schema, arg))
            .collect::<Vec<_>>(),
        "type": type_ref_json(schema, &field.ty),
        "isDeprecated": field.deprecated,
        "deprecationReason": field.deprecation_reason,
    })
}

fn input_value_json(schema: &Schema, input: &InputFieldDef) -> Value {
    json!({
        "name": input.name,
        "description": input.description,
        "type": type_ref_json(schema, &input.ty),
        "defaultValue": input.default_value.as_ref().map(graphql_literal),
    })
}

fn enum_value_json(value: &EnumValueDef) -> Value {
    json!({
        "name": value.name,
        "description": value.description,
        "isDeprecated": value.deprecated,
        "deprecationReason": value.deprecation_reason,
    })
}

fn directive_json(schema: &Schema, directive: &DirectiveDefinition) -> Value {
    json!({
        "name": directive.name,
        "description": directive.description,
        "isRepeatable": directive.repeatable,
        "locations": directive.locations,
        "args": directive
            .arguments
            .values()
            .map(|arg| input_value_json(schema, arg))
            .collect::<Vec<_>>(),
    })
}

/// Prints a default value the way it would be written in a document.
fn graphql_literal(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(graphql_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(fields) => {
            let fields: Vec<_> = fields
                .iter()
                .map(|(name, value)| format!("{name}: {}", graphql_literal(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        other => other.to_string(),
    }
}
