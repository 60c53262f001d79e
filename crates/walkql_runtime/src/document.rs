//! Executable documents.
//!
//! The selection tree handed to the executor. Documents are produced by a
//! parser elsewhere and are immutable once built; every node lives behind an
//! `Arc` so selections can be shared with deferred continuations.

use crate::error::ExecuteError;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use walkql_core::Pos;

/// The kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        })
    }
}

/// A literal or variable value written in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    Variable(String),
    List(Vec<InputValue>),
    Object(Vec<(String, InputValue)>),
}

impl InputValue {
    /// Creates a variable reference.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A directive applied to a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub position: Option<Pos>,
}

impl Directive {
    /// Creates a directive without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            position: None,
        }
    }

    /// `@skip(if: ...)`.
    pub fn skip(condition: impl Into<InputValue>) -> Self {
        Self::new("skip").with_argument("if", condition)
    }

    /// `@include(if: ...)`.
    pub fn include(condition: impl Into<InputValue>) -> Self {
        Self::new("include").with_argument("if", condition)
    }

    /// Adds an argument.
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.arguments.push((name.into(), value.into()));
        self
    }
}

/// A field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub position: Option<Pos>,
}

impl Field {
    /// Creates a field selection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
            position: None,
        }
    }

    /// The key this field is written under: its alias, or its name.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Sets the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.arguments.push((name.into(), value.into()));
        self
    }

    /// Adds a directive.
    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Sets the sub-selections.
    pub fn with_selections(mut self, selections: Vec<Selection>) -> Self {
        self.selection_set = selections;
        self
    }

    /// Sets the source position.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.position = Some(Pos::new(line, column));
        self
    }
}

/// An inline fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub position: Option<Pos>,
}

/// A fragment spread.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
    pub position: Option<Pos>,
}

/// A selection in a selection set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Arc<Field>),
    InlineFragment(Arc<InlineFragment>),
    FragmentSpread(Arc<FragmentSpread>),
}

impl Selection {
    /// Wraps a field.
    pub fn field(field: Field) -> Self {
        Self::Field(Arc::new(field))
    }

    /// A leaf field selection by name.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::field(Field::new(name))
    }

    /// An inline fragment, optionally conditioned on a type.
    pub fn inline(type_condition: Option<&str>, selections: Vec<Selection>) -> Self {
        Self::inline_with(type_condition, Vec::new(), selections)
    }

    /// An inline fragment with directives.
    pub fn inline_with(
        type_condition: Option<&str>,
        directives: Vec<Directive>,
        selections: Vec<Selection>,
    ) -> Self {
        Self::InlineFragment(Arc::new(InlineFragment {
            type_condition: type_condition.map(str::to_string),
            directives,
            selection_set: selections,
            position: None,
        }))
    }

    /// A fragment spread.
    pub fn spread(name: impl Into<String>) -> Self {
        Self::spread_with(name, Vec::new())
    }

    /// A fragment spread with directives.
    pub fn spread_with(name: impl Into<String>, directives: Vec<Directive>) -> Self {
        Self::FragmentSpread(Arc::new(FragmentSpread {
            name: name.into(),
            directives,
            position: None,
        }))
    }
}

/// A named fragment definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

impl FragmentDefinition {
    /// Creates a fragment definition.
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selection_set: selections,
        }
    }
}

/// A variable declared by an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub default_value: Option<InputValue>,
}

/// An operation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub selection_set: Vec<Selection>,
}

impl OperationDefinition {
    /// Creates an operation.
    pub fn new(kind: OperationKind, selections: Vec<Selection>) -> Self {
        Self {
            kind,
            name: None,
            variables: Vec::new(),
            selection_set: selections,
        }
    }

    /// Creates an anonymous query.
    pub fn query(selections: Vec<Selection>) -> Self {
        Self::new(OperationKind::Query, selections)
    }

    /// Creates an anonymous mutation.
    pub fn mutation(selections: Vec<Selection>) -> Self {
        Self::new(OperationKind::Mutation, selections)
    }

    /// Sets the operation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declares a variable.
    pub fn with_variable(mut self, name: impl Into<String>, default_value: Option<InputValue>) -> Self {
        self.variables.push(VariableDefinition {
            name: name.into(),
            default_value,
        });
        self
    }
}

/// An executable document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub operations: Vec<Arc<OperationDefinition>>,
    pub fragments: IndexMap<String, Arc<FragmentDefinition>>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation.
    pub fn with_operation(mut self, operation: OperationDefinition) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    /// Adds a fragment definition.
    pub fn with_fragment(mut self, fragment: FragmentDefinition) -> Self {
        self.fragments
            .insert(fragment.name.clone(), Arc::new(fragment));
        self
    }

    /// Gets a fragment by name.
    pub fn fragment(&self, name: &str) -> Option<&Arc<FragmentDefinition>> {
        self.fragments.get(name)
    }

    /// Selects the operation to run.
    pub fn operation(&self, name: Option<&str>) -> Result<&Arc<OperationDefinition>, ExecuteError> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| ExecuteError::UnknownOperation(name.to_string())),
            None => match self.operations.as_slice() {
                [] => Err(ExecuteError::NoOperation),
                [only] => Ok(only),
                _ => Err(ExecuteError::AmbiguousOperation),
            },
        }
    }
}
