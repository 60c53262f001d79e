//! Runtime for walkql.
//!
//! This crate provides the GraphQL execution runtime:
//! - `schema`: Schema definition and building
//! - `document`: Executable documents
//! - `executor`: Operation execution and field evaluation
//! - `collect`: Selection gathering
//! - `directives`: `@skip` / `@include` filtering
//! - `arguments`: Argument and variable resolution
//! - `complete`: Null handling and type-directed value completion
//! - `coerce`: Leaf value serialization
//! - `result`: The path-addressed result tree
//! - `scheduler`: Deferred values and sibling dispatch
//! - `resolver`: Resolvers, authorizers and scalar coercers
//! - `introspection`: Schema introspection

pub mod arguments;
pub mod collect;
mod coerce;
mod complete;
pub mod directives;
pub mod document;
pub mod error;
pub mod executor;
pub mod introspection;
pub mod resolver;
pub mod result;
pub mod scheduler;
pub mod schema;

pub use document::{
    Directive, Document, Field, FragmentDefinition, InputValue, OperationDefinition, OperationKind,
    Selection,
};
pub use error::ExecuteError;
pub use executor::{Context, Executor, ExecutorConfig, Request, Response};
pub use resolver::{
    Authorizer, ErrorCollector, FieldValue, FnResolver, Resolver, ResolverArgs, ResolverError,
    ResolverInfo, ResolverMap, ResolverResult,
};
pub use result::{Entry, ResultTree};
pub use scheduler::{BoxFuture, Resolution};
pub use schema::{
    DirectiveDefinition, DirectiveLocation, FieldDef, FieldExtra, InputFieldDef, InterfaceDef,
    ObjectDef, Schema, SchemaBuilder, TypeDef, TypeRef, UnionDef,
};
pub use walkql_core::{ExecutionError, PathSegment, Pos, ResponsePath};
