//! Backoff strategies between retry attempts.

use std::sync::Arc;
use std::time::Duration;

/// Computes the delay before a given retry attempt.
///
/// `attempt` is 0-indexed: the delay returned for attempt 0 is the wait
/// before the *first* retry (i.e. after the initial call already failed).
pub trait IntervalFunction: Send + Sync {
    fn interval(&self, attempt: usize) -> Duration;
}

/// Always waits the same duration.
#[derive(Clone, Copy)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial * multiplier^attempt`, capped at `max`.
#[derive(Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max)
    }
}

/// `min(max, initial * 2^attempt + rand[0, jitter))`.
///
/// This is the provider shell's backoff: `initial` is the provider's
/// configured `retryDelayMs`, `jitter` defaults to 1000ms, and `max` is the
/// provider's configured ceiling.
pub struct ExponentialRandomBackoff {
    initial: Duration,
    max: Duration,
    jitter: Duration,
    rng_fn: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl ExponentialRandomBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            jitter: Duration::from_millis(1000),
            rng_fn: Arc::new(rand::random::<f64>),
        }
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    #[doc(hidden)]
    pub fn with_rng<F>(mut self, rng_fn: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.rng_fn = Arc::new(rng_fn);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base_ms = self.initial.as_millis() as f64 * 2f64.powi(attempt as i32);
        let jitter_ms = (self.rng_fn)() * self.jitter.as_millis() as f64;
        let total = Duration::from_millis((base_ms + jitter_ms).round() as u64);
        total.min(self.max)
    }
}

/// Arbitrary function-based backoff.
pub struct FnInterval {
    f: Arc<dyn Fn(usize) -> Duration + Send + Sync>,
}

impl FnInterval {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl IntervalFunction for FnInterval {
    fn interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
