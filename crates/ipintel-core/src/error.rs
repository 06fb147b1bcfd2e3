//! Error taxonomy (spec §7).
//!
//! Transport errors, breaker-open rejections, and LLM/persistence failures
//! never surface here — the provider shell and lookup service absorb them
//! (see `ipintel-providers::shell` and `ipintel-lookup::service`). Only the
//! four propagation-worthy classes reach the caller: validation, provider
//! exhaustion, rate limiting, and the unexpected.

use serde::Serialize;

/// Stable machine-readable error codes, used as the `code` field in HTTP
/// error bodies and matched on by callers that want to branch on failure
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidFormat,
    PrivateIp,
    ReservedIp,
    DnsResolutionFailed,
    InvalidCidr,
    TooManyIps,
    InvalidIps,
    ProvidersUnavailable,
    RateLimitExceeded,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code maps to (spec §6/§7).
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::InvalidFormat
            | ErrorCode::PrivateIp
            | ErrorCode::ReservedIp
            | ErrorCode::DnsResolutionFailed
            | ErrorCode::InvalidCidr
            | ErrorCode::TooManyIps
            | ErrorCode::InvalidIps => 400,
            ErrorCode::ProvidersUnavailable => 503,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::InternalError => 500,
        }
    }
}

/// The only errors the lookup pipeline ever propagates to a caller (spec
/// §7 "Propagation rule"): validation failures, provider-stage exhaustion,
/// rate limiting, and truly unexpected failures. Everything else (a single
/// provider's transport error, a breaker rejection, a cache/DB/LLM
/// failure) is absorbed further down and never constructed as this type.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct LookupError {
    pub code: ErrorCode,
    pub message: String,
    /// Actionable hint shown to the caller, e.g. "use a public IPv4 or IPv6
    /// address". Present for validation errors, absent for 5xx classes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Structured per-item validation failures for batch endpoints
    /// (`INVALID_IPS`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl LookupError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), suggestion: None, details: None }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_format(input: &str) -> Self {
        Self::new(ErrorCode::InvalidFormat, format!("'{input}' is not a valid IP address"))
            .with_suggestion("provide a dotted-quad IPv4 or colon-separated IPv6 address")
    }

    pub fn private_ip(ip: &str) -> Self {
        Self::new(ErrorCode::PrivateIp, format!("'{ip}' is a private address"))
            .with_suggestion("lookups are only supported for public IP addresses")
    }

    pub fn reserved_ip(ip: &str) -> Self {
        Self::new(ErrorCode::ReservedIp, format!("'{ip}' is a reserved, loopback, or multicast address"))
            .with_suggestion("lookups are only supported for public IP addresses")
    }

    pub fn dns_resolution_failed(hostname: &str) -> Self {
        Self::new(ErrorCode::DnsResolutionFailed, format!("failed to resolve '{hostname}' to an IP address"))
    }

    pub fn invalid_cidr(input: &str) -> Self {
        Self::new(ErrorCode::InvalidCidr, format!("'{input}' is not a valid CIDR block"))
            .with_suggestion("provide a CIDR such as '198.51.100.0/30'")
    }

    pub fn cidr_too_large(prefix_len: u8, max_hosts: u32) -> Self {
        Self::new(
            ErrorCode::InvalidCidr,
            format!("/{prefix_len} expands to more than {max_hosts} hosts"),
        )
        .with_suggestion("use a CIDR block of at most 256 hosts (/24 for IPv4, /120 for IPv6)")
    }

    pub fn too_many_ips(count: usize, max: usize) -> Self {
        Self::new(ErrorCode::TooManyIps, format!("{count} IPs requested, maximum is {max}"))
    }

    pub fn invalid_ips(details: Vec<String>) -> Self {
        Self::new(ErrorCode::InvalidIps, "one or more IPs failed validation").with_details(details)
    }

    pub fn providers_unavailable() -> Self {
        Self::new(ErrorCode::ProvidersUnavailable, "All providers failed or timed out")
    }

    pub fn rate_limit_exceeded(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("rate limit exceeded, retry after {retry_after_secs}s"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message.into())
    }
}
