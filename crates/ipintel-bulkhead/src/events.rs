//! Events emitted by the bulkhead as calls are admitted, rejected, and finished.

use ipintel_resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Something the bulkhead noticed about a call.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call acquired a permit and is proceeding.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        concurrent_calls: usize,
    },
    /// A call could not acquire a permit (bulkhead full, or timed out waiting).
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        max_concurrent_calls: usize,
    },
    /// A call finished successfully and released its permit.
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A call finished with an error and released its permit.
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. }
            | BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
