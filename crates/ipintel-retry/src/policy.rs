//! Decides whether a failed call should be retried, and how long to wait.

use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether a given error is retryable.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Combines a backoff strategy with an optional retry predicate.
///
/// Without a predicate every error is retried (up to `max_attempts`); the
/// provider shell relies on this default since transport failures are the
/// only kind of error it ever sees.
pub struct RetryPolicy<E> {
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            interval_fn,
            retry_predicate: None,
        }
    }

    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.interval(attempt)
    }
}
