//! Value completion.
//!
//! [`continue_value`] routes a settled value: nulls and errors are written
//! here and stop, everything else goes on to [`complete_value`], which shapes
//! it by the field's type. Lists fan out per element, abstract types are
//! narrowed to an object type, objects are authorized and descended into.

use crate::coerce::coerce_leaf;
use crate::document::{Field, Selection};
use crate::error::ExecuteError;
use crate::executor::{execute_selection_set, Execution, ObjectFrame};
use crate::resolver::FieldValue;
use crate::result::Entry;
use crate::scheduler::{Resolution, Task};
use crate::schema::{TypeDef, TypeRef};
use serde_json::Value;
use std::sync::Arc;
use walkql_core::{ExecutionError, Pos, ResponsePath};

/// The field a value is being completed for.
///
/// Shared by every element of a list field.
#[derive(Debug)]
pub(crate) struct FieldFrame {
    pub(crate) parent_type: Arc<TypeDef>,
    pub(crate) field_name: String,
    pub(crate) nodes: Arc<[Arc<Field>]>,
    /// Sub-selections of every merged node, concatenated in order.
    pub(crate) selections: Arc<[Selection]>,
}

impl FieldFrame {
    fn position(&self) -> Option<Pos> {
        self.nodes.first().and_then(|node| node.position)
    }

    fn error(&self, path: &ResponsePath, message: impl Into<String>) -> ExecutionError {
        let mut error = ExecutionError::new(message).with_path(path);
        error.fill_location(self.position());
        error
    }

    fn invalid_null(&self, path: &ResponsePath) -> ExecutionError {
        self.error(
            path,
            format!(
                "Cannot return null for non-nullable field {}.{}.",
                self.parent_type.name(),
                self.field_name
            ),
        )
    }
}

/// Handles nulls and errors, returning the value if completion should go on.
pub(crate) fn continue_value(
    exec: &Execution,
    field: &FieldFrame,
    path: &ResponsePath,
    static_type: &TypeRef,
    value: FieldValue,
) -> Option<FieldValue> {
    let non_null = static_type.is_non_null();
    let errors = match value {
        FieldValue::Value(Value::Null) => {
            let mut tree = exec.tree.lock();
            if non_null {
                tree.push_error(field.invalid_null(path));
            }
            tree.write(path, Entry::Null, non_null);
            return None;
        }
        FieldValue::Error(error) => vec![error],
        FieldValue::Errors(errors) if errors.is_empty() => {
            return Some(FieldValue::Value(Value::Array(Vec::new())));
        }
        FieldValue::Errors(errors) => errors,
        FieldValue::Skip => return None,
        other => return Some(other),
    };

    let mut tree = exec.tree.lock();
    for mut error in errors {
        error.fill_path(path);
        error.fill_location(field.position());
        tree.push_error(error);
    }
    tree.write(path, Entry::Null, non_null);
    None
}

/// Completes a value of type `ty` at `path`.
///
/// `static_type` is the declared type at `path`, used for null handling;
/// `ty` is what is left of it after unwrapping.
pub(crate) fn complete_value(
    exec: Arc<Execution>,
    field: Arc<FieldFrame>,
    path: ResponsePath,
    static_type: TypeRef,
    ty: TypeRef,
    value: FieldValue,
) -> Task {
    Box::pin(async move {
        match exec.schema.resolve_late(&ty, &exec.ctx)? {
            TypeRef::NonNull(inner) => {
                complete_value(exec, field, path, static_type, *inner, value).await
            }
            TypeRef::List(inner) => complete_list(exec, field, path, static_type, *inner, value).await,
            TypeRef::Named(definition) => match definition.as_ref() {
                TypeDef::Scalar(_) | TypeDef::Enum(_) => {
                    complete_leaf(&exec, &field, &path, &static_type, &definition, value);
                    Ok(())
                }
                TypeDef::Union(_) | TypeDef::Interface(_) => {
                    complete_abstract(exec, field, path, static_type, definition, value).await
                }
                TypeDef::Object(_) => {
                    complete_object(exec, field, path, static_type, definition, value).await
                }
                TypeDef::InputObject(input) => Err(ExecuteError::UnhandledTypeKind {
                    kind: "input object",
                    type_name: input.name.clone(),
                }),
            },
            TypeRef::Late(name) => Err(ExecuteError::UnknownType(name)),
        }
    })
}

fn report(exec: &Execution, field: &FieldFrame, path: &ResponsePath, static_type: &TypeRef, message: String) {
    let error = field.error(path, message);
    continue_value(exec, field, path, static_type, FieldValue::Error(error));
}

async fn complete_list(
    exec: Arc<Execution>,
    field: Arc<FieldFrame>,
    path: ResponsePath,
    static_type: TypeRef,
    item_type: TypeRef,
    value: FieldValue,
) -> Result<(), ExecuteError> {
    let items: Vec<Resolution> = match value {
        FieldValue::List(items) => items,
        FieldValue::Value(Value::Array(items)) => items.into_iter().map(Resolution::from).collect(),
        _ => {
            let message = format!(
                "Expected a list for field {}.{}.",
                field.parent_type.name(),
                field.field_name
            );
            report(&exec, &field, &path, &static_type, message);
            return Ok(());
        }
    };

    let tasks: Vec<Task> = {
        let mut tree = exec.tree.lock();
        tree.write(&path, Entry::List(items.len()), false);
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let item_path = path.index(index);
                tree.record_static_type(&item_path, item_type.clone());
                complete_item(Arc::clone(&exec), Arc::clone(&field), item_path, item_type.clone(), item)
            })
            .collect()
    };

    let parallel = exec.scheduler.is_parallel(path.len());
    exec.scheduler.run_all(tasks, parallel).await
}

fn complete_item(
    exec: Arc<Execution>,
    field: Arc<FieldFrame>,
    path: ResponsePath,
    item_type: TypeRef,
    item: Resolution,
) -> Task {
    Box::pin(async move {
        let value = exec.scheduler.settle(item).await;
        match continue_value(&exec, &field, &path, &item_type, value) {
            Some(value) => complete_value(exec, field, path, item_type.clone(), item_type, value).await,
            None => Ok(()),
        }
    })
}

fn complete_leaf(
    exec: &Execution,
    field: &FieldFrame,
    path: &ResponsePath,
    static_type: &TypeRef,
    definition: &TypeDef,
    value: FieldValue,
) {
    let coerced = match value {
        FieldValue::Value(value) => coerce_leaf(definition, value, &exec.resolvers),
        _ => Err(format!("{} cannot represent a list value", definition.name())),
    };
    match coerced {
        Ok(Value::Null) => {
            continue_value(exec, field, path, static_type, FieldValue::null());
        }
        Ok(value) => {
            exec.tree.lock().write(path, Entry::Leaf(value), false);
        }
        Err(message) => report(exec, field, path, static_type, message),
    }
}

async fn complete_abstract(
    exec: Arc<Execution>,
    field: Arc<FieldFrame>,
    path: ResponsePath,
    static_type: TypeRef,
    abstract_type: Arc<TypeDef>,
    value: FieldValue,
) -> Result<(), ExecuteError> {
    let concrete = match &value {
        FieldValue::Value(value) => exec
            .schema
            .resolve_abstract_type(&abstract_type, value, &exec.ctx),
        _ => None,
    };
    match concrete {
        Some(object_type) => complete_object(exec, field, path, static_type, object_type, value).await,
        None => {
            let message = format!(
                "Abstract type \"{}\" must resolve to an Object type at runtime for field \"{}.{}\".",
                abstract_type.name(),
                field.parent_type.name(),
                field.field_name
            );
            report(&exec, &field, &path, &static_type, message);
            Ok(())
        }
    }
}

async fn complete_object(
    exec: Arc<Execution>,
    field: Arc<FieldFrame>,
    path: ResponsePath,
    static_type: TypeRef,
    object_type: Arc<TypeDef>,
    value: FieldValue,
) -> Result<(), ExecuteError> {
    let TypeDef::Object(object) = object_type.as_ref() else {
        return Err(ExecuteError::UnhandledTypeKind {
            kind: "abstract",
            type_name: object_type.name().to_string(),
        });
    };
    let FieldValue::Value(value) = value else {
        let message = format!(
            "Expected an object for field {}.{}, got a list.",
            field.parent_type.name(),
            field.field_name
        );
        report(&exec, &field, &path, &static_type, message);
        return Ok(());
    };

    let authorized = exec.resolvers.authorize(object, value, &exec.ctx);
    let authorized = exec.scheduler.settle(authorized).await;
    let value = match continue_value(&exec, &field, &path, &static_type, authorized) {
        Some(FieldValue::Value(value)) => value,
        Some(_) => {
            let message = format!("Authorization of {} returned a list.", object.name);
            report(&exec, &field, &path, &static_type, message);
            return Ok(());
        }
        None => return Ok(()),
    };

    let frame = ObjectFrame {
        path,
        object_type: Arc::clone(&object_type),
        value: Arc::new(value),
    };
    execute_selection_set(exec, frame, Arc::clone(&field.selections), false).await
}
