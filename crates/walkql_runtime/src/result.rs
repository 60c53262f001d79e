//! The path-addressed result tree.
//!
//! Field evaluation writes into the tree by response path as values settle,
//! in whatever order that happens. Containers are written as placeholders
//! before their children; a write only lands on a placeholder whose
//! containers still exist, so anything written below a collapsed subtree is
//! dropped.

use crate::executor::Response;
use crate::schema::TypeRef;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;
use walkql_core::{ExecutionError, PathSegment, ResponsePath};

/// The result tree shared by every task of one execution.
pub type SharedTree = Arc<Mutex<ResultTree>>;

/// A value written at a response path.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Null,
    /// A scalar or enum output.
    Leaf(Value),
    /// An object placeholder with its response keys in order.
    Object(Vec<String>),
    /// A list placeholder with its length.
    List(usize),
}

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Pending,
    Null,
    Leaf(Value),
    Object(IndexMap<String, Slot>),
    List(Vec<Slot>),
}

impl From<Entry> for Slot {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Null => Slot::Null,
            Entry::Leaf(value) => Slot::Leaf(value),
            Entry::Object(keys) => Slot::Object(
                keys.into_iter()
                    .map(|key| (key, Slot::Pending))
                    .collect(),
            ),
            Entry::List(len) => Slot::List(vec![Slot::Pending; len]),
        }
    }
}

/// Accumulates data and errors for one execution.
#[derive(Debug, Default)]
pub struct ResultTree {
    root: Slot,
    static_types: FxHashMap<Vec<PathSegment>, TypeRef>,
    errors: Vec<ExecutionError>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the declared type of the value at `path`.
    pub fn record_static_type(&mut self, path: &ResponsePath, ty: TypeRef) {
        self.static_types.insert(path.segments(), ty);
    }

    /// Returns the declared type of the value at `path`, if recorded.
    pub fn static_type(&self, path: &ResponsePath) -> Option<&TypeRef> {
        self.static_types.get(&path.segments())
    }

    /// Records an application error.
    pub fn push_error(&mut self, error: ExecutionError) {
        self.errors.push(error);
    }

    /// Errors recorded so far, in arrival order.
    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    /// Writes `entry` at `path`, returning true if it landed.
    ///
    /// A propagating write ignores `entry` and nulls the nearest ancestor
    /// whose declared type is nullable, or the whole data when there is none.
    pub fn write(&mut self, path: &ResponsePath, entry: Entry, propagating: bool) -> bool {
        let segments = path.segments();
        if propagating {
            return self.propagate_null(&segments);
        }

        match self.slot_mut(&segments) {
            Some(slot) if matches!(slot, Slot::Pending) => {
                *slot = entry.into();
                true
            }
            _ => {
                trace!(path = %path, "write discarded");
                false
            }
        }
    }

    /// Returns true if a value at `path` can still appear in the output.
    pub fn is_live(&self, path: &ResponsePath) -> bool {
        let mut slot = &self.root;
        for segment in path.segments() {
            let child = match (slot, &segment) {
                (Slot::Object(fields), PathSegment::Field(key)) => fields.get(key),
                (Slot::List(items), PathSegment::Index(index)) => items.get(*index),
                _ => None,
            };
            match child {
                Some(child) => slot = child,
                None => return false,
            }
        }
        !matches!(slot, Slot::Null)
    }

    /// Renders the data as it currently stands.
    pub fn data(&self) -> Value {
        render(self.root.clone())
    }

    /// Finishes the execution, ordering errors by path.
    pub fn into_response(self) -> Response {
        let mut errors = self.errors;
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        Response {
            data: render(self.root),
            errors,
        }
    }

    fn propagate_null(&mut self, segments: &[PathSegment]) -> bool {
        for depth in (1..segments.len()).rev() {
            let ancestor = &segments[..depth];
            if self
                .static_types
                .get(ancestor)
                .is_some_and(TypeRef::is_non_null)
            {
                continue;
            }
            return match self.slot_mut(ancestor) {
                Some(slot) if !matches!(slot, Slot::Null) => {
                    trace!(depth, "null propagated");
                    *slot = Slot::Null;
                    true
                }
                _ => false,
            };
        }
        trace!("null propagated to data");
        self.root = Slot::Null;
        true
    }

    fn slot_mut(&mut self, segments: &[PathSegment]) -> Option<&mut Slot> {
        let mut slot = &mut self.root;
        for segment in segments {
            slot = match (slot, segment) {
                (Slot::Object(fields), PathSegment::Field(key)) => fields.get_mut(key)?,
                (Slot::List(items), PathSegment::Index(index)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(slot)
    }
}

fn render(slot: Slot) -> Value {
    match slot {
        Slot::Pending | Slot::Null => Value::Null,
        Slot::Leaf(value) => value,
        Slot::Object(fields) => Value::Object(
            fields
                .into_iter()
                .filter(|(_, slot)| !matches!(slot, Slot::Pending))
                .map(|(key, slot)| (key, render(slot)))
                .collect(),
        ),
        Slot::List(items) => Value::Array(items.into_iter().map(render).collect()),
    }
}
