//! Errors that abort an execution.
//!
//! These are broken preconditions (the document or schema should have been
//! rejected before execution) or request-level failures. Field-level problems
//! are [`walkql_core::ExecutionError`]s and never end up here.

use crate::document::OperationKind;
use thiserror::Error;

/// An error that aborts execution of a request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The document has no operations.
    #[error("document contains no operations")]
    NoOperation,

    /// The requested operation does not exist.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// Several operations exist and no name was given.
    #[error("an operation name is required when the document contains multiple operations")]
    AmbiguousOperation,

    /// The schema has no root type for the operation kind.
    #[error("schema does not define a root type for {0} operations")]
    MissingRootType(OperationKind),

    /// A type name could not be found in the registry.
    #[error("unknown type `{0}`")]
    UnknownType(String),

    /// A selected field is not defined on its owning type.
    #[error("type `{type_name}` has no field `{field}`")]
    UnknownField { type_name: String, field: String },

    /// A fragment spread names a fragment the document does not define.
    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),

    /// A value reached a type kind that cannot produce output.
    #[error("cannot complete a value of {kind} type `{type_name}`")]
    UnhandledTypeKind {
        kind: &'static str,
        type_name: String,
    },

    /// A spawned field task panicked or was cancelled.
    #[error("field task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl ExecuteError {
    /// Returns true for faults a validated document and schema rule out.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownType(_)
                | Self::UnknownField { .. }
                | Self::UnknownFragment(_)
                | Self::UnhandledTypeKind { .. }
                | Self::TaskFailed(_)
        )
    }
}
