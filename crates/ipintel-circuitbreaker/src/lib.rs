//! A three-state (closed/open/half-open) circuit breaker middleware for
//! Tower services, counting *consecutive* failures rather than a sliding
//! failure rate.
//!
//! This is deliberately simpler than a sliding-window breaker: once
//! `failure_threshold` consecutive calls fail, the circuit opens for
//! `reset_timeout`; a single success in CLOSED resets the streak to zero.
//! That simplicity is what lets every provider adapter share one
//! predictable breaker shape.
//!
//! # Example
//!
//! ```rust
//! use tower::{Service, ServiceBuilder, ServiceExt, service_fn};
//! use ipintel_circuitbreaker::CircuitBreakerLayer;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let layer = CircuitBreakerLayer::builder()
//!     .name("ipwhois")
//!     .failure_threshold(3)
//!     .reset_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let mut service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
//!
//! let resp = service.ready().await.unwrap().call("1.1.1.1".into()).await.unwrap();
//! assert_eq!(resp, "1.1.1.1");
//! # }
//! ```

mod circuit;
mod config;
mod error;
mod events;
#[cfg(feature = "health-integration")]
mod health_integration;
mod layer;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

use circuit::Circuit;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

/// The circuit-breaker-wrapped service itself.
///
/// Cloning a `CircuitBreaker` is cheap and shares the same breaker state
/// (important: every clone used to serve concurrent calls for the same
/// provider must observe the same failure count).
pub struct CircuitBreaker<S> {
    inner: S,
    circuit: Arc<Circuit>,
    config: Arc<CircuitBreakerConfig>,
}

impl<S: Clone> Clone for CircuitBreaker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            circuit: Arc::clone(&self.circuit),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> CircuitBreaker<S> {
    pub(crate) fn new(inner: S, config: Arc<CircuitBreakerConfig>) -> Self {
        Self {
            inner,
            circuit: Arc::new(Circuit::new()),
            config,
        }
    }

    /// Lock-free read of the current state. Safe to poll frequently (e.g.
    /// from a `/providers` admin endpoint) without contending with calls.
    pub fn state_sync(&self) -> CircuitState {
        self.circuit.state_sync()
    }

    /// `true` iff the breaker is CLOSED.
    pub fn is_healthy(&self) -> bool {
        self.state_sync() == CircuitState::Closed
    }

    /// Consistent snapshot of state + counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.circuit.metrics()
    }

    /// Admin reset: force CLOSED and zero every counter.
    pub fn reset(&self) {
        self.circuit.reset(&self.config);
    }

    /// Force the breaker OPEN regardless of current counters (used by
    /// health-check integrations).
    pub fn force_open(&self) {
        self.circuit.force_open(&self.config);
    }

    /// Force the breaker CLOSED regardless of current counters.
    pub fn force_closed(&self) {
        self.circuit.reset(&self.config);
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let circuit = Arc::clone(&self.circuit);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Err(next_retry_at) = circuit.try_acquire(&config) {
                let wait = next_retry_at
                    .map(|at| at.saturating_duration_since(Instant::now()))
                    .unwrap_or_default();
                return Err(CircuitBreakerError::Open {
                    name: config.name.clone(),
                    retry_after: wait,
                });
            }

            let result = inner.call(request).await;
            match &result {
                Ok(_) => circuit.record_success(&config),
                Err(_) => circuit.record_failure(&config),
            }
            result.map_err(CircuitBreakerError::Inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::{service_fn, Service, ServiceExt};

    fn failing_service(
        calls: Arc<AtomicUsize>,
    ) -> impl Service<(), Response = (), Error = &'static str, Future = impl Future<Output = Result<(), &'static str>>> + Clone
    {
        service_fn(move |_: ()| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom") }
        })
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CircuitBreakerLayer::builder()
            .name("test")
            .failure_threshold(3)
            .build();
        let mut breaker = layer.layer_fn(failing_service(calls.clone()));

        for _ in 0..3 {
            let _ = breaker.ready().await.unwrap().call(()).await;
        }
        assert_eq!(breaker.state_sync(), CircuitState::Open);

        // Fourth call must be rejected without reaching the adapter.
        let err = breaker.ready().await.unwrap().call(()).await.unwrap_err();
        assert!(err.is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_success_closes_and_failure_reopens() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CircuitBreakerLayer::builder()
            .name("test")
            .failure_threshold(1)
            .reset_timeout(Duration::from_millis(10))
            .half_open_attempts(1)
            .build();
        let mut breaker = layer.layer_fn(failing_service(calls.clone()));

        let _ = breaker.ready().await.unwrap().call(()).await;
        assert_eq!(breaker.state_sync(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(15)).await;

        // Probe call is allowed through in HALF_OPEN, and it fails again.
        let _ = breaker.ready().await.unwrap().call(()).await;
        assert_eq!(breaker.state_sync(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_closed_failure_count() {
        let flips = Arc::new(AtomicUsize::new(0));
        let flips_clone = flips.clone();
        let svc = service_fn(move |succeed: bool| {
            let flips = flips_clone.clone();
            async move {
                if succeed {
                    Ok::<_, &'static str>(())
                } else {
                    flips.fetch_add(1, Ordering::SeqCst);
                    Err("boom")
                }
            }
        });
        let layer = CircuitBreakerLayer::builder()
            .name("test")
            .failure_threshold(2)
            .build();
        let mut breaker = layer.layer_fn(svc);

        let _ = breaker.ready().await.unwrap().call(false).await;
        let _ = breaker.ready().await.unwrap().call(true).await;
        let _ = breaker.ready().await.unwrap().call(false).await;
        // Two failures but interrupted by a success: still closed.
        assert_eq!(breaker.state_sync(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn reset_forces_closed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CircuitBreakerLayer::builder()
            .name("test")
            .failure_threshold(1)
            .build();
        let mut breaker = layer.layer_fn(failing_service(calls));
        let _ = breaker.ready().await.unwrap().call(()).await;
        assert_eq!(breaker.state_sync(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state_sync(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_count, 0);
    }
}
