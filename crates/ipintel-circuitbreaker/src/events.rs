//! Events emitted by the circuit breaker as it transitions between states.

use ipintel_resilience_core::ResilienceEvent;
use std::time::Instant;

use crate::CircuitState;

/// Something the circuit breaker noticed about a call or a state change.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved from one state to another.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was let through.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A call succeeded.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call failed.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::CallPermitted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::FailureRecorded { pattern_name, .. } => pattern_name,
        }
    }
}
