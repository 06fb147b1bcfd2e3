use std::time::Duration;
use thiserror::Error;

/// Errors returned by the [`crate::CircuitBreaker`] service.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without reaching the
    /// inner service.
    #[error("circuit breaker OPEN for {name}")]
    Open {
        name: String,
        /// How long until the breaker will admit a probe call.
        retry_after: Duration,
    },

    /// The inner service ran and returned an error.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// True if the call was rejected because the circuit is open, as
    /// opposed to the inner service having actually failed.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// Returns the inner error, if the breaker let the call through and the
    /// inner service failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open { .. } => None,
        }
    }
}
