/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for template resolution.
 */

use std::path::PathBuf;

use lima_config::{DecodeError, ValidationError};
use thiserror::Error;

use crate::runtime::RuntimeError;

/// Result type alias for lima-template operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A template or script could not be located or read.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("invalid locator {locator:?}: {source}")]
    InvalidUrl {
        locator: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{locator:?} is not a valid file URL")]
    InvalidFileUrl { locator: String },

    #[error("unsupported scheme {scheme:?} in locator {locator:?}")]
    UnsupportedScheme { locator: String, scheme: String },

    #[error("{locator:?} needs a template directory to resolve")]
    NoTemplateDir { locator: String },

    #[error("{locator:?} does not name a template")]
    InvalidTemplateName { locator: String },

    #[error("cannot resolve {reference:?} relative to {base}: {source}")]
    Join {
        reference: String,
        base: String,
        #[source]
        source: url::ParseError,
    },

    #[error("remote template {base} cannot reference local path {reference:?}")]
    AbsolutePathInRemote { reference: String, base: String },

    #[error("cannot make {} absolute: {source}", path.display())]
    Absolute {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {locator}: {source}")]
    Read {
        locator: String,
        #[source]
        source: RuntimeError,
    },
}

/// Main error type for template resolution.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Yaml(#[from] lima_yaml::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("template resolution was cancelled")]
    Cancelled,
}
