/*
 * runtime.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Defines the Runtime trait that template resolution reads through.
 *
 * NativeRuntime reads local files. Fetching remote templates is left to
 * callers, who plug in their own Runtime.
 */

use std::io;

use crate::cancellation::Cancellation;
use crate::locator::Locator;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while reading a template or script
#[derive(Debug)]
pub enum RuntimeError {
    /// Standard I/O error
    Io(io::Error),

    /// Operation not supported on this runtime (e.g., fetching a URL natively)
    NotSupported(String),

    /// Network operation failed
    Network(String),

    /// The read was cancelled before it started
    Cancelled,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
            RuntimeError::NotSupported(msg) => write!(f, "Operation not supported: {}", msg),
            RuntimeError::Network(msg) => write!(f, "Network error: {}", msg),
            RuntimeError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> Self {
        RuntimeError::Io(e)
    }
}

/// Source of template and script bytes.
///
/// Resolution calls `read` once per base template and once per embedded
/// script. Implementations must check `cancel` before doing any I/O and
/// must not retry on failure.
pub trait Runtime {
    fn read(&self, locator: &Locator, cancel: &Cancellation) -> RuntimeResult<Vec<u8>>;
}

/// Runtime backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        NativeRuntime
    }
}

impl Runtime for NativeRuntime {
    fn read(&self, locator: &Locator, cancel: &Cancellation) -> RuntimeResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        match locator {
            Locator::Path(path) => Ok(std::fs::read(path)?),
            Locator::Url(url) => Err(RuntimeError::NotSupported(format!(
                "fetching {url} needs a runtime with network access"
            ))),
        }
    }
}
