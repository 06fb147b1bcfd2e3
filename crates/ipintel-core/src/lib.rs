//! Shared data model, IP normalization, error taxonomy, and
//! environment-driven configuration for the ipintel aggregator.
//!
//! This crate has no network or storage dependencies of its own; every
//! other `ipintel-*` crate depends on it for the value types that flow
//! between them (`ProviderResult`, `CorrelatedIpRecord`, `LookupError`, ...).

pub mod config;
pub mod error;
pub mod ip;
pub mod model;
pub mod trust;

pub use error::{ErrorCode, LookupError};
pub use model::*;
