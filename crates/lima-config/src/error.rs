//! Decode and marshal errors.

use std::fmt;
use thiserror::Error;

/// One step in a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A path into the configuration, such as `additionalDisks[1].format`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn prepend(&mut self, segment: PathSegment) {
        self.segments.insert(0, segment);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// The document does not have the shape of a Lima configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DecodeError {
    /// Where in the document decoding failed; empty for document-level errors.
    pub path: FieldPath,
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        DecodeError {
            path: FieldPath::new(),
            message: message.into(),
        }
    }

    /// Record that the error happened inside the mapping entry `key`.
    pub fn within_key(mut self, key: &str) -> Self {
        self.path.prepend(PathSegment::Key(key.to_string()));
        self
    }

    /// Record that the error happened inside the sequence item `index`.
    pub fn within_index(mut self, index: usize) -> Self {
        self.path.prepend(PathSegment::Index(index));
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "field `{}`: {}", self.path, self.message)
        }
    }
}

impl serde::de::Error for DecodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        DecodeError::new(msg.to_string())
    }
}

impl From<lima_yaml::Error> for DecodeError {
    fn from(err: lima_yaml::Error) -> Self {
        DecodeError::new(err.to_string())
    }
}

#[derive(Debug, Error)]
#[error("failed to marshal YAML: {0}")]
pub struct MarshalError(#[from] pub serde_yaml::Error);
