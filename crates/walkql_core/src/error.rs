//! Path-attached execution errors.
//!
//! An [`ExecutionError`] is an application-level error: it is collected
//! alongside partial data and never aborts execution on its own.

use crate::path::{PathSegment, ResponsePath};
use crate::pos::Pos;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error attached to a location in the response.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExecutionError {
    /// The error message.
    pub message: String,
    /// Source positions of the originating selection nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Pos>,
    /// The path to the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Error extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, serde_json::Value>>,
}

impl ExecutionError {
    /// Creates a new error with no path or location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
        }
    }

    /// Sets the path.
    pub fn with_path(mut self, path: &ResponsePath) -> Self {
        self.path = Some(path.segments());
        self
    }

    /// Adds a source location.
    pub fn with_location(mut self, pos: Pos) -> Self {
        self.locations.push(pos);
        self
    }

    /// Adds an extension.
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
        self
    }

    /// Sets the error code extension.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", serde_json::Value::String(code.into()))
    }

    /// Sets the path unless the producer already did.
    pub fn fill_path(&mut self, path: &ResponsePath) {
        if self.path.is_none() {
            self.path = Some(path.segments());
        }
    }

    /// Sets the location unless the producer already did.
    pub fn fill_location(&mut self, pos: Option<Pos>) {
        if let (true, Some(pos)) = (self.locations.is_empty(), pos) {
            self.locations.push(pos);
        }
    }
}
