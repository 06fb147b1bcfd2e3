//! Data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static, per-process configuration for one provider (spec §3
/// `ProviderConfig`). Immutable once built at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
    /// `[0, 10]`; defaults to 5 if not configured (spec §3).
    pub trust_rank: u8,
}

impl ProviderConfig {
    pub const DEFAULT_TRUST_RANK: u8 = 5;
}

/// A provider's partial answer for one IP (spec §3 `ProviderResult`).
///
/// Invariant: `success == false` implies every data field below is `None`;
/// `success == true` implies `latency_ms >= 0` (enforced by the type: `u64`
/// cannot be negative).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: String,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_vpn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_tor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hosting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_provider: Option<String>,

    /// `[0, 100]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abuse_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    /// Opaque per-provider payload, used later by VPN-provider extraction
    /// and by the LLM enricher. See `ipintel-providers::raw` for the typed
    /// per-adapter accessors (spec §9 design note: "avoid schema-less maps
    /// in hot paths").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ProviderResult {
    pub fn disabled(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            latency_ms: 0,
            error: Some("Provider is disabled".to_string()),
            ..Default::default()
        }
    }

    pub fn failure(provider: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            latency_ms,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Finest geolocation granularity present on a fused record (spec §3
/// `location.accuracy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationAccuracy {
    City,
    Region,
    Country,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<LocationAccuracy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_vpn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_tor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hosting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_provider: Option<String>,
    /// `[0, 100]`, `round(100 * min(1, succeeded/10))` (spec §4.4).
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Threat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abuse_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Cache,
    Db,
    Live,
    Stale,
}

/// Structured LLM analysis (spec §4.7), opaque beyond its declared shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub summary: String,
    pub risk_assessment: String,
    pub recommendations: Vec<String>,
    pub threat_indicators: Vec<String>,
    /// `[0, 100]`.
    pub confidence: u8,
    pub verdict: LlmVerdict,
    pub severity_level: LlmSeverity,
    pub executive_summary: String,
    pub technical_details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmVerdict {
    Block,
    Investigate,
    Monitor,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmSeverity {
    Critical,
    High,
    Medium,
    Low,
    Safe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictReport>>,
    pub source: RecordSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    pub partial_data: bool,
    pub providers_queried: usize,
    pub providers_succeeded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<LlmAnalysis>,
}

/// The canonical fused output of correlation for one IP (spec §3
/// `CorrelatedIpRecord`).
///
/// Invariants: `expires_at == created_at + ttl_seconds`;
/// `providers_succeeded <= providers_queried == metadata.providers.len()`;
/// `partial_data <=> exists a provider result with success == false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedIpRecord {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    pub location: Location,
    pub flags: Flags,
    pub threat: Threat,
    pub metadata: Metadata,
}

impl CorrelatedIpRecord {
    /// Recomputes `expires_at` from `created_at + ttl_seconds`, keeping the
    /// invariant intact after a cache "touch on access" TTL extension (spec
    /// §4.5 step 2, §9 open question).
    pub fn touch_ttl(&mut self, ttl_seconds: i64, now: DateTime<Utc>) {
        self.metadata.ttl_seconds = ttl_seconds;
        self.metadata.updated_at = now;
        self.metadata.expires_at = now + chrono::Duration::seconds(ttl_seconds);
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.metadata.expires_at
    }
}

/// One field's conflict resolution (spec §3 `ConflictReport`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub field: String,
    pub values: Vec<ConflictValue>,
    pub resolved: String,
    pub reason: ConflictReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictValue {
    pub value: String,
    pub providers: Vec<String>,
    pub trust_score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    MajorityVote,
    HighestTrust,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictReason::MajorityVote => "majority vote",
            ConflictReason::HighestTrust => "highest trust",
        }
    }
}

/// Per-provider daily stats, persisted (spec §3 "Provider daily stats").
/// Keyed by `(provider, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDailyStats {
    pub provider: String,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub avg_latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Bulk lookup result envelope (spec §4.5 "Bulk lookup").
#[derive(Debug, Clone, Serialize)]
pub struct BulkLookupResponse {
    pub results: Vec<BulkItemResult>,
    pub summary: BulkSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    pub ip: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CorrelatedIpRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    pub processing_time_ms: u64,
}

/// CIDR expansion result envelope (spec §4.5 "CIDR lookup").
#[derive(Debug, Clone, Serialize)]
pub struct CidrLookupResponse {
    pub cidr: CidrInfo,
    pub results: Vec<BulkItemResult>,
    pub summary: BulkSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct CidrInfo {
    pub input: String,
    pub network: String,
    pub prefix_length: u8,
    pub total_ips: u32,
}

/// Present on a lookup response when `input` did not syntactically resemble
/// an IP and was resolved via a single A-record DNS lookup (spec §4.5 step
/// 1, §6 "200 CorrelatedIpRecord (optionally with `resolvedFrom`)").
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFrom {
    pub hostname: String,
    pub resolved_ip: String,
}

/// Progress callback payload emitted once per provider settlement (spec
/// §4.3 step 3).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderProgress {
    pub provider: String,
    pub success: bool,
    pub index: usize,
    pub total: usize,
}

/// Immutable, process-wide trust-rank overrides keyed by provider name
/// (spec §4.4 "Trust rank table").
pub type TrustOverrides = HashMap<String, u8>;
