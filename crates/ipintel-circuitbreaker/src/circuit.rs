use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The three states a circuit breaker can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are allowed through; failures are being counted.
    Closed = 0,
    /// Calls are rejected synchronously until `reset_timeout` elapses.
    Open = 1,
    /// A limited number of probe calls are allowed through.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

/// Point-in-time view of a breaker's counters, safe to read without racing
/// concurrent `record_success`/`record_failure` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub next_retry_at: Option<Instant>,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_retry_at: Option<Instant>,
}

/// Per-provider circuit breaker state, shared across every concurrent caller.
///
/// All mutation goes through a single lock so reads (e.g. for a health
/// endpoint) never observe a torn combination of state and counters.
pub(crate) struct Circuit {
    inner: Mutex<Inner>,
    state_atomic: Arc<AtomicU8>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                next_retry_at: None,
            }),
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
        }
    }

    /// Lock-free snapshot of just the state, for frequent/low-stakes reads.
    pub(crate) fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        CircuitMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            next_retry_at: inner.next_retry_at,
        }
    }

    /// Implements the CLOSED/OPEN/HALF_OPEN/invocation transition table.
    /// Returns `Ok(())` if the call may proceed, `Err(next_retry_at)` if it
    /// must be rejected synchronously.
    pub(crate) fn try_acquire(
        &self,
        config: &CircuitBreakerConfig,
    ) -> Result<(), Option<Instant>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                self.emit(config, CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state: inner.state,
                });
                Ok(())
            }
            CircuitState::Open => {
                let ready = inner.next_retry_at.map(|at| now >= at).unwrap_or(true);
                if ready {
                    self.transition(&mut inner, config, CircuitState::HalfOpen);
                    self.emit(config, CircuitBreakerEvent::CallPermitted {
                        pattern_name: config.name.clone(),
                        timestamp: now,
                        state: CircuitState::HalfOpen,
                    });
                    Ok(())
                } else {
                    let retry_at = inner.next_retry_at;
                    self.emit(config, CircuitBreakerEvent::CallRejected {
                        pattern_name: config.name.clone(),
                        timestamp: now,
                    });
                    Err(retry_at)
                }
            }
            CircuitState::HalfOpen => {
                // Only one probe call is admitted per half-open window; the
                // outcome of that call decides the next transition.
                if inner.success_count + inner.failure_count == 0 {
                    self.emit(config, CircuitBreakerEvent::CallPermitted {
                        pattern_name: config.name.clone(),
                        timestamp: now,
                        state: inner.state,
                    });
                    Ok(())
                } else {
                    self.emit(config, CircuitBreakerEvent::CallRejected {
                        pattern_name: config.name.clone(),
                        timestamp: now,
                    });
                    Err(inner.next_retry_at)
                }
            }
        }
    }

    pub(crate) fn record_success(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        let state = inner.state;

        self.emit(config, CircuitBreakerEvent::SuccessRecorded {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            state,
        });

        match state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= config.half_open_attempts {
                    self.transition(&mut inner, config, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        let state = inner.state;

        self.emit(config, CircuitBreakerEvent::FailureRecorded {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            state,
        });

        match state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= config.failure_threshold {
                    self.transition(&mut inner, config, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, config, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn reset(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, config, CircuitState::Closed);
    }

    /// Forces OPEN regardless of the current failure count. Used by health
    /// checkers that detect a dependency is down through means other than
    /// a call failure.
    pub(crate) fn force_open(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, config, CircuitState::Open);
    }

    fn transition(&self, inner: &mut Inner, config: &CircuitBreakerConfig, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.next_retry_at = if to == CircuitState::Open {
            Some(Instant::now() + config.reset_timeout)
        } else {
            None
        };
        self.state_atomic.store(to as u8, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(provider = %config.name, ?from, ?to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "to" => format!("{:?}", to)
            )
            .increment(1);
            metrics::gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(to as u8 as f64);
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                from_state: from,
                to_state: to,
            });
    }

    fn emit(&self, config: &CircuitBreakerConfig, event: CircuitBreakerEvent) {
        config.event_listeners.emit(&event);
    }
}
