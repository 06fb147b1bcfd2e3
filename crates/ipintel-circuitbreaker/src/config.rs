use crate::events::CircuitBreakerEvent;
use ipintel_resilience_core::EventListeners;
use std::time::Duration;

/// Configuration for a single provider's circuit breaker.
///
/// Defaults match the provider shell's defaults: 5 consecutive failures
/// trip the breaker, it stays open for 60s, and a single successful probe
/// closes it again.
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) reset_timeout: Duration,
    pub(crate) half_open_attempts: u32,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_attempts: u32,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_attempts: 1,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Consecutive failures in CLOSED before the breaker opens. Default: 5.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// How long the breaker stays OPEN before probing again. Default: 60s.
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = duration;
        self
    }

    /// Consecutive successes in HALF_OPEN required to close. Default: 1.
    pub fn half_open_attempts(mut self, n: u32) -> Self {
        self.half_open_attempts = n;
        self
    }

    /// Human-readable name used in events, metrics, and error messages.
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for state transitions.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        use ipintel_resilience_core::FnListener;
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback for rejected calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        use ipintel_resilience_core::FnListener;
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    pub fn build(self) -> crate::layer::CircuitBreakerLayer {
        crate::layer::CircuitBreakerLayer::new(CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            half_open_attempts: self.half_open_attempts,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
