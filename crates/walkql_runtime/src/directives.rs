//! Conditional inclusion directives.
//!
//! `@skip(if:)` and `@include(if:)` decide whether a field, inline fragment
//! or fragment spread takes part in selection gathering. Other directives
//! are ignored here.

use crate::arguments::build_arguments;
use crate::document::Directive;
use crate::schema::Schema;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// Returns true unless a `@skip` resolves its `if` to true or an `@include`
/// resolves its `if` to false.
///
/// Directives are tested in the order written.
pub fn should_include(
    directives: &[Directive],
    schema: &Schema,
    variables: &HashMap<String, Value>,
) -> bool {
    directives.iter().all(|directive| {
        let excluded_when = match directive.name.as_str() {
            "skip" => true,
            "include" => false,
            _ => return true,
        };
        condition(directive, schema, variables) != Some(excluded_when)
    })
}

fn condition(directive: &Directive, schema: &Schema, variables: &HashMap<String, Value>) -> Option<bool> {
    let args = match schema.directive(&directive.name) {
        Some(definition) => build_arguments(&definition.arguments, &directive.arguments, variables),
        None => build_arguments(&IndexMap::new(), &directive.arguments, variables),
    };
    args.get("if").and_then(Value::as_bool)
}
