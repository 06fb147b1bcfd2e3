//! Lets a health checker proactively force a breaker open or closed,
//! independent of the failure counting in [`crate::circuit::Circuit`].

use crate::CircuitBreaker;
use ipintel_resilience_core::HealthTriggerable;

impl<S> HealthTriggerable for CircuitBreaker<S>
where
    S: Send + Sync + 'static,
{
    fn trigger_unhealthy(&self) {
        self.force_open();
    }

    fn trigger_healthy(&self) {
        self.force_closed();
    }
}
