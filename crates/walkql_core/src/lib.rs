//! Core value types for walkql.
//!
//! This crate provides the types shared by every layer of the executor:
//! - `pos`: Source positions of selection nodes
//! - `path`: Response paths addressing locations in the result
//! - `error`: Path-attached execution errors

pub mod error;
pub mod path;
pub mod pos;

pub use error::ExecutionError;
pub use path::{PathSegment, ResponsePath};
pub use pos::Pos;
