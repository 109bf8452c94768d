//! Error types for YAML parsing.

use thiserror::Error;

/// Result type alias for lima-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing a template document.
///
/// Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// YAML syntax error
    #[error("YAML parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Valid YAML that templates do not support (anchors, aliases, complex keys)
    #[error("{feature} are not supported (line {line}, column {column})")]
    Unsupported {
        feature: &'static str,
        line: usize,
        column: usize,
    },

    /// The same key appears twice in one mapping
    #[error("duplicate key {key:?} at line {line}")]
    DuplicateKey { key: String, line: usize },

    /// The document root must be a mapping
    #[error("document root must be a mapping")]
    NotAMapping,
}

impl From<yaml_rust2::ScanError> for Error {
    fn from(err: yaml_rust2::ScanError) -> Self {
        let marker = err.marker();
        Error::Parse {
            message: err.info().to_string(),
            line: marker.line(),
            column: marker.col() + 1,
        }
    }
}
