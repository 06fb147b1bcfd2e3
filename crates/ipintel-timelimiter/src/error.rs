//! Error types for time limiter.

use thiserror::Error;

/// Errors that can occur when using a time limiter.
#[derive(Debug, Clone, Error)]
pub enum TimeLimiterError<E> {
    /// The call did not complete within the configured timeout.
    #[error("call timed out")]
    Timeout,
    /// The underlying service returned an error before the timeout elapsed.
    #[error("{0}")]
    Inner(E),
}

impl<E> TimeLimiterError<E> {
    /// Returns `true` if this error represents a timeout rather than an
    /// inner service error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::Timeout)
    }

    /// Unwraps the inner service error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeLimiterError::Inner(e) => Some(e),
            TimeLimiterError::Timeout => None,
        }
    }
}
