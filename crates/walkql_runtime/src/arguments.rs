//! Argument value resolution.
//!
//! Turns the literal and variable values written in a document into JSON
//! values, filling declared defaults. A fresh map is built for every call.

use crate::document::{Field, InputValue};
use crate::resolver::{ErrorCollector, ResolverArgs};
use crate::schema::{FieldDef, FieldExtra, InputFieldDef};
use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the arguments written on a node against their definitions.
///
/// A variable the request did not provide counts as an absent argument, so
/// the definition's default applies.
pub fn build_arguments(
    definitions: &IndexMap<String, InputFieldDef>,
    supplied: &[(String, InputValue)],
    variables: &HashMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut args: IndexMap<String, Value> = supplied
        .iter()
        .filter_map(|(name, value)| Some((name.clone(), input_to_value(value, variables)?)))
        .collect();

    for (name, definition) in definitions {
        if args.contains_key(name) {
            continue;
        }
        if let Some(default) = &definition.default_value {
            args.insert(name.clone(), default.clone());
        }
    }
    args
}

/// Builds what a resolver receives: arguments plus the extras its field asks for.
pub(crate) fn resolver_args(
    definition: &FieldDef,
    node: &Arc<Field>,
    variables: &HashMap<String, Value>,
    errors: ErrorCollector,
) -> ResolverArgs {
    let args = build_arguments(&definition.arguments, &node.arguments, variables);
    let node = definition
        .extras
        .contains(&FieldExtra::AstNode)
        .then(|| Arc::clone(node));
    let errors = definition
        .extras
        .contains(&FieldExtra::Errors)
        .then_some(errors);
    ResolverArgs::with_extras(args, node, errors)
}

/// Converts a document value, or `None` for an unset variable.
pub fn input_to_value(value: &InputValue, variables: &HashMap<String, Value>) -> Option<Value> {
    let value = match value {
        InputValue::Variable(name) => return variables.get(name).cloned(),
        InputValue::Null => Value::Null,
        InputValue::Int(i) => Value::from(*i),
        InputValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        InputValue::String(s) | InputValue::Enum(s) => Value::String(s.clone()),
        InputValue::Boolean(b) => Value::Bool(*b),
        InputValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| input_to_value(item, variables).unwrap_or(Value::Null))
                .collect(),
        ),
        InputValue::Object(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), input_to_value(value, variables)?)))
                .collect(),
        ),
    };
    Some(value)
}
