//! Environment-driven configuration (spec §6 "Environment variables",
//! SPEC_FULL §9.3).
//!
//! `Settings::parse()` is called once at process startup (after
//! `dotenvy::dotenv()` has had a chance to populate `std::env` from a
//! `.env` file); every downstream component receives its piece of this
//! struct by value or by `Arc`, never re-reading the environment itself.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ipintel", about = "IP intelligence aggregator")]
pub struct Settings {
    /// Max concurrent outbound provider calls per lookup (spec §4.3).
    #[arg(long, env = "PROVIDER_CONCURRENCY", default_value_t = 4)]
    pub provider_concurrency: usize,

    /// Per-provider call deadline (spec §4.1).
    #[arg(long, env = "PROVIDER_TIMEOUT_MS", default_value_t = 3000)]
    pub provider_timeout_ms: u64,

    /// Retry attempts after the first try (spec §4.1).
    #[arg(long, env = "PROVIDER_RETRIES", default_value_t = 2)]
    pub provider_retries: usize,

    #[arg(long, env = "PROVIDER_RETRY_DELAY_MS", default_value_t = 500)]
    pub provider_retry_delay_ms: u64,

    /// Global per-request deadline across all providers (spec §4.3, §5).
    #[arg(long, env = "LOOKUP_GLOBAL_TIMEOUT_MS", default_value_t = 5000)]
    pub lookup_global_timeout_ms: u64,

    /// Cache tier TTL (spec §6 "Cache layout").
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 2_592_000)]
    pub cache_ttl_seconds: i64,

    /// Below this remaining TTL, a cache hit extends back to the full
    /// window (spec §4.5 step 2, §9 open question).
    #[arg(long, env = "CACHE_REFRESH_THRESHOLD_SECONDS", default_value_t = 2_160_000)]
    pub cache_refresh_threshold_seconds: i64,

    #[arg(long, env = "CIRCUIT_BREAKER_FAILURE_THRESHOLD", default_value_t = 5)]
    pub circuit_breaker_failure_threshold: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_RESET_TIMEOUT_MS", default_value_t = 60_000)]
    pub circuit_breaker_reset_timeout_ms: u64,

    #[arg(long, env = "CIRCUIT_BREAKER_HALF_OPEN_ATTEMPTS", default_value_t = 1)]
    pub circuit_breaker_half_open_attempts: u32,

    /// Sliding 60s-window per-requester limit for bulk/CIDR endpoints
    /// (spec §4.5 "Per-requester rate limit").
    #[arg(long, env = "BULK_RATE_LIMIT_IPS_PER_MINUTE", default_value_t = 500)]
    pub bulk_rate_limit_ips_per_minute: u32,

    #[arg(long, env = "LLM_ENABLED", default_value_t = true)]
    pub llm_enabled: bool,

    #[arg(long, env = "LLM_TIMEOUT_MS", default_value_t = 30_000)]
    pub llm_timeout_ms: u64,

    #[arg(long, env = "BULK_MAX_IPS", default_value_t = 100)]
    pub bulk_max_ips: usize,

    #[arg(long, env = "BULK_CONCURRENCY", default_value_t = 5)]
    pub bulk_concurrency: usize,

    #[arg(long, env = "CIDR_MAX_HOSTS", default_value_t = 256)]
    pub cidr_max_hosts: u32,

    /// Grace period past `expiresAt` before a DB row is reclaimed (spec
    /// §6 "Database" cleanup).
    #[arg(long, env = "DB_CLEANUP_GRACE_DAYS", default_value_t = 7)]
    pub db_cleanup_grace_days: i64,

    #[arg(long, env = "HTTP_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub http_bind_addr: String,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/ipintel")]
    pub database_url: String,

    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[arg(long, env = "ADMIN_API_KEY")]
    pub admin_api_key: Option<String>,
}
