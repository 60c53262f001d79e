//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use walkql_runtime::{
    Document, Executor, ExecutorConfig, OperationDefinition, Request, ResolverMap, Response,
    Schema, Selection,
};

/// Runs a single anonymous query.
pub async fn run_query(schema: Schema, resolvers: ResolverMap, selections: Vec<Selection>) -> Response {
    run_with(schema, resolvers, ExecutorConfig::default(), query(selections)).await
}

/// Runs a request with the given configuration.
pub async fn run_with(
    schema: Schema,
    resolvers: ResolverMap,
    config: ExecutorConfig,
    request: Request,
) -> Response {
    Executor::new_with(config, resolvers)
        .execute(Arc::new(schema), request)
        .await
        .expect("execution should not fault")
}

/// A request for an anonymous query.
pub fn query(selections: Vec<Selection>) -> Request {
    Request::new(Document::new().with_operation(OperationDefinition::query(selections)))
}

/// Installs a test subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
