//! Core infrastructure for ipintel-resilience.
//!
//! This crate provides shared functionality used across all ipintel-resilience modules:
//! - Event system for observability
//! - Metrics infrastructure
//! - Common configuration patterns
//! - Registry for managing instances

pub mod error;
pub mod events;
#[cfg(feature = "health-integration")]
pub mod health_integration;

pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
#[cfg(feature = "health-integration")]
pub use health_integration::{HealthTriggerable, SharedHealthTrigger, TriggerHealth};
