//! The pluggable adapter boundary (spec §4.1, §9 design note).
//!
//! Individual provider request/response parsing is an external collaborator
//! per spec §1 ("treated as pluggable adapters"); this module only defines
//! the shape every adapter must fill in. See `ipintel_providers::adapters`
//! for the mechanical, per-vendor implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// What an adapter contributes for one IP — any field may be absent (spec
/// §3 "Partial result"). This is the pre-shell shape; the shell adds
/// `provider`, `success`, `latency_ms`, and `error` to produce a full
/// `ipintel_core::ProviderResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialResult {
    pub asn: Option<String>,
    pub org: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub is_proxy: Option<bool>,
    pub is_vpn: Option<bool>,
    pub is_tor: Option<bool>,
    pub is_hosting: Option<bool>,
    pub is_mobile: Option<bool>,
    pub vpn_provider: Option<String>,
    pub abuse_score: Option<u8>,
    /// Opaque payload kept for VPN-provider extraction and LLM enrichment
    /// (spec §9 design note: "a small typed core plus an opaque `raw`
    /// payload").
    pub raw: Option<serde_json::Value>,
}

/// Transport-level failure from an adapter's `perform_lookup`. The shell
/// converts every variant into a `ProviderResult{success: false, ...}` —
/// this type never escapes `ipintel-providers`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("response could not be parsed: {0}")]
    Parse(String),
    #[error("cancelled")]
    Cancelled,
}

/// One third-party reputation/geolocation endpoint. Adapters supply only
/// the lookup logic; the shell (`crate::shell::Provider`) wraps every
/// adapter in circuit breaker + retry + timeout + metrics.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name, matched against `ProviderConfig::name` and
    /// used in trust-rank lookups, metrics labels, and conflict reports.
    fn name(&self) -> &str;

    /// Issue the outbound call and parse the response into a
    /// `PartialResult`. Implementations must respect `cancel`: select
    /// against `cancel.cancelled()` around any suspension point so the
    /// shell's composed global/per-provider deadline can abort in-flight
    /// I/O (spec §4.1 "Timeout composition").
    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError>;
}
