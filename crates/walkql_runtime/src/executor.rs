//! Query execution for walkql.
//!
//! The executor walks the selected operation against the schema. Every
//! field is prepared synchronously in document order: definition lookup,
//! argument resolution and the resolver call. Whatever the resolver hands
//! back is then settled and completed as its own task, writing into the
//! shared [`ResultTree`] by response path.

use crate::arguments::{input_to_value, resolver_args};
use crate::collect::Gatherer;
use crate::complete::{complete_value, continue_value, FieldFrame};
use crate::document::{Document, Field, OperationKind, Selection};
use crate::error::ExecuteError;
use crate::introspection;
use crate::resolver::{ErrorCollector, ResolverInfo, ResolverMap};
use crate::result::{Entry, ResultTree, SharedTree};
use crate::scheduler::{Resolution, Scheduler, Task};
use crate::schema::{FieldDefinition, Schema, TypeDef};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info_span, trace, Instrument, Span};
use walkql_core::{ExecutionError, ResponsePath};

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Depth below which sibling fields and list items are spawned as tasks.
    pub max_parallel_depth: usize,
    /// Maximum number of deferred values awaited at once. Zero is unbounded.
    pub max_concurrent_resolvers: usize,
    /// Enable a span per field.
    pub tracing: bool,
    /// Answer `__schema` and `__type`.
    pub introspection: bool,
    /// Skip resolvers whose parent object has already collapsed to null.
    pub prune_collapsed_subtrees: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_depth: 10,
            max_concurrent_resolvers: 100,
            tracing: false,
            introspection: true,
            prune_collapsed_subtrees: false,
        }
    }
}

impl ExecutorConfig {
    /// Sets the parallel depth.
    pub fn with_max_parallel_depth(mut self, depth: usize) -> Self {
        self.max_parallel_depth = depth;
        self
    }

    /// Sets the bound on concurrently awaited values.
    pub fn with_max_concurrent_resolvers(mut self, limit: usize) -> Self {
        self.max_concurrent_resolvers = limit;
        self
    }

    /// Enables or disables per-field spans.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    /// Enables or disables introspection.
    pub fn with_introspection(mut self, enabled: bool) -> Self {
        self.introspection = enabled;
        self
    }

    /// Enables or disables pruning beneath collapsed objects.
    pub fn with_prune_collapsed_subtrees(mut self, enabled: bool) -> Self {
        self.prune_collapsed_subtrees = enabled;
        self
    }
}

/// The query executor.
pub struct Executor {
    config: ExecutorConfig,
    resolvers: Arc<ResolverMap>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("resolvers", &self.resolvers)
            .finish()
    }
}

impl Executor {
    /// Creates a new executor.
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::default(),
            resolvers: Arc::new(ResolverMap::new()),
        }
    }

    /// Creates an executor with configuration.
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            resolvers: Arc::new(ResolverMap::new()),
        }
    }

    /// Creates an executor with resolvers.
    pub fn with_resolvers(resolvers: ResolverMap) -> Self {
        Self {
            config: ExecutorConfig::default(),
            resolvers: Arc::new(resolvers),
        }
    }

    /// Creates an executor with config and resolvers.
    pub fn new_with(config: ExecutorConfig, resolvers: ResolverMap) -> Self {
        Self {
            config,
            resolvers: Arc::new(resolvers),
        }
    }

    /// Gets a reference to the resolvers.
    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    /// Gets the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes a request.
    ///
    /// Field-level failures end up in [`Response::errors`]. An `Err` means
    /// the request could not run or hit an internal fault, and no partial
    /// result is returned.
    pub async fn execute(&self, schema: Arc<Schema>, request: Request) -> Result<Response, ExecuteError> {
        let Request {
            document,
            operation_name,
            root_value,
            mut context,
        } = request;

        let operation = Arc::clone(document.operation(operation_name.as_deref())?);
        for variable in &operation.variables {
            if context.variables.contains_key(&variable.name) {
                continue;
            }
            if let Some(value) = variable
                .default_value
                .as_ref()
                .and_then(|default| input_to_value(default, &HashMap::new()))
            {
                context.variables.insert(variable.name.clone(), value);
            }
        }
        let root_type = schema.root_type(operation.kind, &context)?;

        debug!(
            operation = operation.name.as_deref().unwrap_or("<anonymous>"),
            kind = %operation.kind,
            root_type = root_type.name(),
            "executing operation"
        );

        let exec = Arc::new(Execution {
            schema,
            document,
            resolvers: Arc::clone(&self.resolvers),
            scheduler: Scheduler::new(&self.config),
            config: self.config.clone(),
            ctx: context,
            tree: Arc::new(Mutex::new(ResultTree::new())),
        });
        let frame = ObjectFrame {
            path: ResponsePath::root(),
            object_type: root_type,
            value: Arc::new(root_value),
        };
        let selections: Arc<[Selection]> = operation.selection_set.clone().into();
        let serial = operation.kind == OperationKind::Mutation;

        if let Err(fault) = execute_selection_set(Arc::clone(&exec), frame, selections, serial).await {
            error!(error = %fault, "execution aborted");
            return Err(fault);
        }

        let tree = std::mem::take(&mut *exec.tree.lock());
        let response = tree.into_response();
        debug!(errors = response.errors.len(), "operation complete");
        Ok(response)
    }
}

/// A request to execute.
#[derive(Debug, Clone)]
pub struct Request {
    pub document: Arc<Document>,
    pub operation_name: Option<String>,
    /// The parent value of the root fields.
    pub root_value: Value,
    pub context: Context,
}

impl Request {
    /// Creates a request for the document's only operation.
    pub fn new(document: impl Into<Arc<Document>>) -> Self {
        Self {
            document: document.into(),
            operation_name: None,
            root_value: Value::Object(serde_json::Map::new()),
            context: Context::new(),
        }
    }

    /// Selects an operation by name.
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Sets the root value.
    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    /// Sets the request context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Sets the variables.
    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.context.variables = variables;
        self
    }
}

/// State shared by every task of one execution.
pub(crate) struct Execution {
    pub(crate) schema: Arc<Schema>,
    pub(crate) document: Arc<Document>,
    pub(crate) resolvers: Arc<ResolverMap>,
    pub(crate) config: ExecutorConfig,
    pub(crate) ctx: Context,
    pub(crate) tree: SharedTree,
    pub(crate) scheduler: Scheduler,
}

/// An object whose selection set is being executed.
#[derive(Debug, Clone)]
pub(crate) struct ObjectFrame {
    pub(crate) path: ResponsePath,
    pub(crate) object_type: Arc<TypeDef>,
    pub(crate) value: Arc<Value>,
}

/// Executes `selections` against an object.
///
/// The object's placeholder is written first. Fields are then prepared in
/// first-occurrence order; `serial` runs each one to completion before the
/// next is prepared.
pub(crate) fn execute_selection_set(
    exec: Arc<Execution>,
    frame: ObjectFrame,
    selections: Arc<[Selection]>,
    serial: bool,
) -> Task {
    Box::pin(async move {
        let grouped = Gatherer::new(&exec.schema, &exec.document, &exec.ctx)
            .collect(&frame.object_type, &selections)?;
        exec.tree.lock().write(
            &frame.path,
            Entry::Object(grouped.keys().cloned().collect()),
            false,
        );

        if serial {
            for (response_key, nodes) in grouped {
                execute_field(&exec, &frame, response_key, nodes)?.await?;
            }
            return Ok(());
        }

        let mut tasks = Vec::with_capacity(grouped.len());
        for (response_key, nodes) in grouped {
            tasks.push(execute_field(&exec, &frame, response_key, nodes)?);
        }
        let parallel = exec.scheduler.is_parallel(frame.path.len());
        exec.scheduler.run_all(tasks, parallel).await
    })
}

/// Prepares one response key and returns the work that completes it.
fn execute_field(
    exec: &Arc<Execution>,
    frame: &ObjectFrame,
    response_key: String,
    nodes: Vec<Arc<Field>>,
) -> Result<Task, ExecuteError> {
    let Some(node) = nodes.first().cloned() else {
        return Ok(Box::pin(async { Ok(()) }));
    };
    let definition = exec
        .schema
        .field_definition(&frame.object_type, &node.name)
        .ok_or_else(|| ExecuteError::UnknownField {
            type_name: frame.object_type.name().to_string(),
            field: node.name.clone(),
        })?;
    let def = definition.def();
    let return_type = exec.schema.resolve_late(&def.ty, &exec.ctx)?;
    let path = frame.path.field(response_key);
    exec.tree
        .lock()
        .record_static_type(&path, return_type.clone());

    if exec.config.prune_collapsed_subtrees && !exec.tree.lock().is_live(&frame.path) {
        trace!(path = %path, "parent collapsed, resolver skipped");
        return Ok(Box::pin(async { Ok(()) }));
    }

    let field = Arc::new(FieldFrame {
        parent_type: Arc::clone(&frame.object_type),
        field_name: node.name.clone(),
        selections: nodes
            .iter()
            .flat_map(|node| node.selection_set.iter().cloned())
            .collect(),
        nodes: nodes.into(),
    });

    let span = if exec.config.tracing {
        info_span!(
            "field",
            parent_type = frame.object_type.name(),
            field = %node.name,
            path = %path,
        )
    } else {
        Span::none()
    };

    let resolution = span.in_scope(|| {
        let errors = ErrorCollector::new(path.clone(), node.position, Arc::clone(&exec.tree));
        let args = resolver_args(def, &node, &exec.ctx.variables, errors);
        match definition {
            FieldDefinition::Introspection(meta, _) => introspection::resolve_meta(
                meta,
                &exec.schema,
                &frame.object_type,
                &args,
                &exec.ctx,
                exec.config.introspection,
            ),
            FieldDefinition::Ordinary(_) => {
                match exec.resolvers.get(frame.object_type.name(), &node.name) {
                    Some(resolver) => {
                        let info = ResolverInfo::new(&node.name, frame.object_type.name())
                            .with_return_type(return_type.to_string())
                            .with_path(path.clone())
                            .with_schema(Arc::clone(&exec.schema));
                        resolver.resolve(&frame.value, args, &exec.ctx, &info)
                    }
                    None => Resolution::ready(Value::Null),
                }
            }
        }
    });

    let exec = Arc::clone(exec);
    let task = async move {
        let value = exec.scheduler.settle(resolution).await;
        match continue_value(&exec, &field, &path, &return_type, value) {
            Some(value) => {
                complete_value(exec, field, path, return_type.clone(), return_type, value).await
            }
            None => Ok(()),
        }
    };
    Ok(Box::pin(task.instrument(span)))
}

/// Execution context.
#[derive(Debug, Clone)]
pub struct Context {
    /// Request-scoped data.
    pub data: HashMap<String, serde_json::Value>,
    /// Variables from the request.
    pub variables: HashMap<String, serde_json::Value>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates a new context.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    /// Creates a context with variables.
    pub fn with_variables(variables: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: HashMap::new(),
            variables,
        }
    }

    /// Sets a value in the context.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }

    /// Gets a value from the context.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets a variable by name.
    pub fn variable(&self, name: &str) -> Option<&serde_json::Value> {
        self.variables.get(name)
    }

    /// Gets a variable as a specific type.
    pub fn variable_as<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Option<T> {
        self.variables
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The data; null when a failure reached the root.
    pub data: Value,
    /// The errors, ordered by path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
}

impl Response {
    /// Creates a successful response with data.
    pub fn data(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Returns true if the response has errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if the response has data.
    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Field, OperationDefinition};
    use crate::resolver::ResolverError;
    use crate::schema::{FieldDef, ObjectDef, SchemaBuilder, TypeRef};
    use serde_json::json;

    fn create_test_schema() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new()
                .query_type("Query")
                .add_type(TypeDef::Object(
                    ObjectDef::new("Query")
                        .field(FieldDef::new("user", TypeRef::named("User")))
                        .field(FieldDef::new("users", TypeRef::list(TypeRef::named("User")))),
                ))
                .add_type(TypeDef::Object(
                    ObjectDef::new("User")
                        .field(FieldDef::new("id", TypeRef::required("ID")))
                        .field(FieldDef::new("name", TypeRef::named("String"))),
                ))
                .build(),
        )
    }

    fn query(selections: Vec<Selection>) -> Request {
        Request::new(Document::new().with_operation(OperationDefinition::query(selections)))
    }

    fn user_selection() -> Selection {
        Selection::field(
            Field::new("user").with_selections(vec![Selection::leaf("id"), Selection::leaf("name")]),
        )
    }

    #[tokio::test]
    async fn test_execute_simple_query() {
        let mut resolvers = ResolverMap::new();
        resolvers.register_fn("Query", "user", |_parent, _args, _ctx, _info| {
            Ok(json!({"id": "1", "name": "Alice"}))
        });

        let executor = Executor::with_resolvers(resolvers);
        let response = executor
            .execute(create_test_schema(), query(vec![user_selection()]))
            .await
            .unwrap();

        assert!(!response.has_errors());
        assert_eq!(response.data, json!({"user": {"id": "1", "name": "Alice"}}));
    }

    #[tokio::test]
    async fn test_execute_typename() {
        let executor = Executor::new();
        let response = executor
            .execute(create_test_schema(), query(vec![Selection::leaf("__typename")]))
            .await
            .unwrap();

        assert_eq!(response.data, json!({"__typename": "Query"}));
    }

    #[tokio::test]
    async fn test_execute_with_error() {
        let mut resolvers = ResolverMap::new();
        resolvers.register_fn("Query", "user", |_parent, _args, _ctx, _info| {
            Err(ResolverError::Custom("User not found".to_string()))
        });

        let executor = Executor::with_resolvers(resolvers);
        let response = executor
            .execute(create_test_schema(), query(vec![user_selection()]))
            .await
            .unwrap();

        assert_eq!(response.data, json!({"user": null}));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "User not found");
        assert_eq!(
            response.errors[0].path,
            Some(vec![walkql_core::PathSegment::from("user")])
        );
    }

    #[tokio::test]
    async fn test_execute_list_field() {
        let executor = Executor::new();
        let request = query(vec![Selection::field(
            Field::new("users").with_selections(vec![Selection::leaf("id"), Selection::leaf("name")]),
        )])
        .with_root_value(json!({
            "users": [
                {"id": "1", "name": "Alice"},
                {"id": "2", "name": "Bob"}
            ]
        }));

        let response = executor.execute(create_test_schema(), request).await.unwrap();
        let users = response.data["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["id"], "1");
        assert_eq!(users[1]["name"], "Bob");
    }

    #[tokio::test]
    async fn test_unknown_field_is_a_fault() {
        let executor = Executor::new();
        let result = executor
            .execute(create_test_schema(), query(vec![Selection::leaf("nope")]))
            .await;

        assert!(matches!(
            result,
            Err(ExecuteError::UnknownField { type_name, field }) if type_name == "Query" && field == "nope"
        ));
    }

    #[tokio::test]
    async fn test_missing_mutation_root() {
        let executor = Executor::new();
        let request = Request::new(
            Document::new().with_operation(OperationDefinition::mutation(vec![Selection::leaf("x")])),
        );
        let result = executor.execute(create_test_schema(), request).await;
        assert!(matches!(
            result,
            Err(ExecuteError::MissingRootType(OperationKind::Mutation))
        ));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ExecutorConfig =
            serde_json::from_value(json!({"max_parallel_depth": 2, "introspection": false})).unwrap();
        assert_eq!(config.max_parallel_depth, 2);
        assert!(!config.introspection);
        assert_eq!(config.max_concurrent_resolvers, 100);
        assert!(!config.prune_collapsed_subtrees);
    }

    #[test]
    fn test_context() {
        let mut ctx = Context::new();
        ctx.set("user_id", "123");

        assert_eq!(ctx.get::<String>("user_id"), Some("123".to_string()));
        assert_eq!(ctx.get::<String>("missing"), None);
    }

    #[test]
    fn test_context_with_variables() {
        let mut vars = HashMap::new();
        vars.insert("id".to_string(), json!("42"));

        let ctx = Context::with_variables(vars);
        assert_eq!(ctx.variable("id"), Some(&json!("42")));
        assert_eq!(ctx.variable_as::<String>("id"), Some("42".to_string()));
    }

    #[test]
    fn test_response_serialization() {
        let response = Response::data(json!({"hello": "world"}));
        assert!(response.has_data());
        assert!(!response.has_errors());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": {"hello": "world"}})
        );

        let response = Response {
            data: Value::Null,
            errors: vec![ExecutionError::new("Error")],
        };
        assert!(!response.has_data());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": null, "errors": [{"message": "Error"}]})
        );
    }
}
