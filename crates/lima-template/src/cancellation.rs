/*
 * cancellation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Cancellation token threaded through template resolution.
 */

//! Cancellation for template resolution.
//!
//! Resolution may read remote templates, so callers own timeout and abort
//! policy. Every read and every base visit checks the token first.

/// A cancellation token shared between the caller and a resolution.
///
/// Wraps `tokio_util::sync::CancellationToken`; clones share state.
#[derive(Debug, Clone)]
pub struct Cancellation {
    inner: tokio_util::sync::CancellationToken,
}

impl Cancellation {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Request cancellation.
    ///
    /// After this is called, `is_cancelled()` will return `true`.
    pub fn cancel(&self) {
        self.inner.cancel()
    }

    /// A token that is cancelled with this one, but can also be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl From<tokio_util::sync::CancellationToken> for Cancellation {
    fn from(token: tokio_util::sync::CancellationToken) -> Self {
        Self { inner: token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = Cancellation::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = Cancellation::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_only() {
        let parent = Cancellation::new();
        let child = parent.child();

        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
