//! Response paths.
//!
//! A [`ResponsePath`] is an immutable, persistent list of segments. Extending a
//! path never touches the parent, so a path can be cloned into a deferred
//! continuation and read whenever that continuation finally runs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A response key (alias or field name).
    Field(String),
    /// A list index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Field(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Field(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl PartialOrd for PathSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Keys sort before indices so that error ordering is total.
impl Ord for PathSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => a.cmp(b),
            (Self::Index(a), Self::Index(b)) => a.cmp(b),
            (Self::Field(_), Self::Index(_)) => Ordering::Less,
            (Self::Index(_), Self::Field(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Debug)]
struct PathNode {
    parent: ResponsePath,
    segment: PathSegment,
    len: usize,
}

/// An immutable response path.
#[derive(Debug, Clone, Default)]
pub struct ResponsePath(Option<Arc<PathNode>>);

impl ResponsePath {
    /// The empty path, addressing the root of the response data.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path extended by a field segment.
    #[must_use]
    pub fn field(&self, key: impl Into<String>) -> Self {
        self.push(PathSegment::Field(key.into()))
    }

    /// Returns a new path extended by an index segment.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.push(PathSegment::Index(index))
    }

    fn push(&self, segment: PathSegment) -> Self {
        Self(Some(Arc::new(PathNode {
            parent: self.clone(),
            segment,
            len: self.len() + 1,
        })))
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.len)
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the last segment.
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.as_ref().map(|node| &node.segment)
    }

    /// Returns the parent path. The root is its own parent.
    pub fn parent(&self) -> ResponsePath {
        self.0
            .as_ref()
            .map(|node| node.parent.clone())
            .unwrap_or_default()
    }

    /// Returns the segments from the root down.
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::with_capacity(self.len());
        let mut current = self.0.as_ref();
        while let Some(node) = current {
            segments.push(node.segment.clone());
            current = node.parent.0.as_ref();
        }
        segments.reverse();
        segments
    }
}

impl PartialEq for ResponsePath {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.segments() == other.segments()
    }
}

impl Eq for ResponsePath {}

impl From<&[PathSegment]> for ResponsePath {
    fn from(segments: &[PathSegment]) -> Self {
        segments
            .iter()
            .fold(Self::root(), |path, segment| path.push(segment.clone()))
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
