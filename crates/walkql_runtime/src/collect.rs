//! Selection gathering.
//!
//! Flattens a selection set against the runtime object type into response
//! keys, each with every field node that shares it. Fragments whose type
//! condition does not apply are left out.

use crate::directives::should_include;
use crate::document::{Document, Field, Selection};
use crate::error::ExecuteError;
use crate::executor::Context;
use crate::schema::{Schema, TypeDef, TypeRef};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Field nodes grouped by response key, in first-occurrence order.
pub type GroupedFields = IndexMap<String, Vec<Arc<Field>>>;

pub(crate) struct Gatherer<'a> {
    schema: &'a Schema,
    document: &'a Document,
    ctx: &'a Context,
}

impl<'a> Gatherer<'a> {
    pub(crate) fn new(schema: &'a Schema, document: &'a Document, ctx: &'a Context) -> Self {
        Self {
            schema,
            document,
            ctx,
        }
    }

    /// Gathers `selections` for a value whose runtime type is `runtime_type`.
    pub(crate) fn collect(
        &self,
        runtime_type: &TypeDef,
        selections: &[Selection],
    ) -> Result<GroupedFields, ExecuteError> {
        let mut grouped = GroupedFields::new();
        let mut visited = FxHashSet::default();
        self.collect_into(runtime_type, selections, &mut grouped, &mut visited)?;
        Ok(grouped)
    }

    fn collect_into(
        &self,
        runtime_type: &TypeDef,
        selections: &[Selection],
        grouped: &mut GroupedFields,
        visited: &mut FxHashSet<String>,
    ) -> Result<(), ExecuteError> {
        let variables = &self.ctx.variables;
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    if !should_include(&field.directives, self.schema, variables) {
                        continue;
                    }
                    grouped
                        .entry(field.response_key().to_string())
                        .or_default()
                        .push(Arc::clone(field));
                }
                Selection::InlineFragment(fragment) => {
                    if !should_include(&fragment.directives, self.schema, variables) {
                        continue;
                    }
                    if let Some(condition) = &fragment.type_condition {
                        if !self.applies(condition, runtime_type)? {
                            continue;
                        }
                    }
                    self.collect_into(runtime_type, &fragment.selection_set, grouped, visited)?;
                }
                Selection::FragmentSpread(spread) => {
                    let fragment = self
                        .document
                        .fragment(&spread.name)
                        .ok_or_else(|| ExecuteError::UnknownFragment(spread.name.clone()))?;
                    if visited.contains(&spread.name)
                        || !should_include(&spread.directives, self.schema, variables)
                    {
                        continue;
                    }
                    visited.insert(spread.name.clone());
                    if !self.applies(&fragment.type_condition, runtime_type)? {
                        continue;
                    }
                    self.collect_into(runtime_type, &fragment.selection_set, grouped, visited)?;
                }
            }
        }
        Ok(())
    }

    /// Returns true if a fragment conditioned on `condition` applies to `runtime_type`.
    fn applies(&self, condition: &str, runtime_type: &TypeDef) -> Result<bool, ExecuteError> {
        match self.schema.resolve_late(&TypeRef::named(condition), self.ctx)? {
            TypeRef::Named(condition_type) => Ok(self
                .schema
                .is_possible_type(&condition_type, runtime_type.name())),
            _ => Ok(false),
        }
    }
}
