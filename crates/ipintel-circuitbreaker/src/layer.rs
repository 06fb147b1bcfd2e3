use crate::config::CircuitBreakerConfig;
use crate::CircuitBreaker;
use std::sync::Arc;
use tower::Layer;

/// A Tower `Layer` that wraps a service with circuit breaker behavior.
///
/// # Example
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use ipintel_circuitbreaker::CircuitBreakerLayer;
///
/// let layer = CircuitBreakerLayer::builder()
///     .name("whois-provider")
///     .failure_threshold(5)
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreakerLayer {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn builder() -> crate::CircuitBreakerConfigBuilder {
        crate::CircuitBreakerConfigBuilder::new()
    }

    /// Wraps `service`, returning the `CircuitBreaker` directly rather than
    /// through `Layer::layer`. Useful when the caller needs the admin
    /// handles (`force_open`, `force_closed`, `metrics`) before composing
    /// it into a `ServiceBuilder` stack.
    pub fn layer_fn<S>(&self, service: S) -> CircuitBreaker<S> {
        CircuitBreaker::new(service, Arc::clone(&self.config))
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.config))
    }
}
