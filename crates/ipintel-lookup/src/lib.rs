//! The lookup pipeline (spec §4.5): the single entry point that stitches
//! cache, database, provider fan-out, correlation, and LLM enrichment into
//! one coherent `lookup()` call, plus the bulk and CIDR variants built on
//! top of it.
//!
//! Concurrent callers for the *same* IP share one provider fan-out through
//! `ipintel-coalesce`, the same way a cache-stampede guard would — this is
//! the one place in the pipeline the teacher's coalescing primitive maps
//! onto directly rather than needing generalization.

pub mod background;
pub mod bulk;
pub mod cidr;
pub mod stream;

use background::BackgroundSink;
use chrono::Utc;
use ipintel_cache::IpCache;
use ipintel_coalesce::{CoalesceError, CoalesceLayer};
use ipintel_core::config::Settings;
use ipintel_core::model::{CorrelatedIpRecord, RecordSource, ResolvedFrom};
use ipintel_core::trust::TrustTable;
use ipintel_core::{ip, LookupError};
use ipintel_db::IpDb;
use ipintel_llm::LlmEnricher;
use ipintel_manager::ProviderManager;
use ipintel_providers::{Provider, ProviderRegistry};
use ipintel_ratelimiter::KeyedSlidingWindowLimiter;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

/// Caps how many background daily-stats writes may be outstanding at once
/// (spec §5 "detached through a background-best-effort sink that is itself
/// bounded").
const BACKGROUND_SINK_CAPACITY: usize = 64;

/// The coalescing key for the provider stage: two callers share one
/// outbound fan-out only if they want the same freshness and enrichment
/// behavior for the same IP.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CoalesceKey {
    ip: String,
    force_refresh: bool,
    include_llm: bool,
}

fn extract_key(key: &CoalesceKey) -> CoalesceKey {
    key.clone()
}

type StageLayer = CoalesceLayer<CoalesceKey, CoalesceKey, fn(&CoalesceKey) -> CoalesceKey>;
type Stage = <StageLayer as Layer<ProviderStageService>>::Service;

struct LookupInner {
    providers: Vec<Arc<Provider>>,
    registry: ProviderRegistry,
    manager: ProviderManager,
    trust: Arc<TrustTable>,
    cache: IpCache,
    db: IpDb,
    llm: Arc<LlmEnricher>,
    settings: Arc<Settings>,
    background: BackgroundSink,
    bulk_limiter: KeyedSlidingWindowLimiter<String>,
}

impl LookupInner {
    /// Steps 5-8 of spec §4.5: fan out to providers, correlate, optionally
    /// enrich, persist. Runs exactly once per coalesced key no matter how
    /// many callers share it.
    async fn run_provider_stage(&self, key: CoalesceKey) -> Result<CorrelatedIpRecord, LookupError> {
        let results = self.manager.query_all(&self.providers, &key.ip, self.settings.lookup_global_timeout_ms, None).await;
        self.record_daily_stats(&results);

        let succeeded = results.iter().filter(|r| r.success).count();
        if succeeded == 0 {
            return Err(LookupError::providers_unavailable());
        }

        let now = Utc::now();
        let mut record = ipintel_correlation::correlate(&key.ip, &results, &self.trust, RecordSource::Live, self.settings.cache_ttl_seconds, now);

        if key.include_llm && self.settings.llm_enabled {
            if let Some(analysis) = self.llm.analyze(&record).await {
                record.metadata.llm_analysis = Some(analysis);
            }
        }

        self.persist(&record).await;
        Ok(record)
    }

    /// Per-provider daily stats go through the background sink: the
    /// request path never waits on them (spec §5).
    fn record_daily_stats(&self, results: &[ipintel_core::model::ProviderResult]) {
        let today = Utc::now().date_naive();
        for r in results {
            let provider = r.provider.clone();
            let success = r.success;
            let latency_ms = r.latency_ms;
            let timed_out = !success && r.error.as_deref().is_some_and(|e| e.contains("timed out"));
            let error = r.error.clone();
            let db = self.db.clone();
            self.background.spawn("provider-daily-stats", async move {
                if let Err(e) = db.record_provider_result(&provider, today, success, timed_out, latency_ms, error.as_deref()).await {
                    tracing::warn!(provider, error = %e, "failed to record provider daily stats");
                }
            });
        }
    }

    /// Writes cache and database in parallel, awaited before returning to
    /// the caller (spec §4.5 step 8) — failures are logged, never
    /// propagated (spec §7).
    async fn persist(&self, record: &CorrelatedIpRecord) {
        let ttl = self.settings.cache_ttl_seconds;
        let (cache_result, db_result) = tokio::join!(self.cache.set(&record.ip, record, ttl), self.db.upsert(record));
        if let Err(e) = cache_result {
            tracing::warn!(ip = %record.ip, error = %e, "failed to persist record to cache");
        }
        if let Err(e) = db_result {
            tracing::warn!(ip = %record.ip, error = %e, "failed to persist record to database");
        }
    }
}

#[derive(Clone)]
struct ProviderStageService {
    inner: Arc<LookupInner>,
}

impl Service<CoalesceKey> for ProviderStageService {
    type Response = CorrelatedIpRecord;
    type Error = LookupError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, key: CoalesceKey) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.run_provider_stage(key).await })
    }
}

fn flatten_coalesce_error(err: CoalesceError<LookupError>) -> LookupError {
    match err {
        CoalesceError::Service(e) => e,
        CoalesceError::LeaderCancelled | CoalesceError::RecvError => LookupError::internal("lookup coalescing was interrupted"),
    }
}

/// Below this remaining TTL a cache hit is refreshed back to the full
/// window (spec §4.5 step 2, §9 open question — preserved as specified).
fn needs_touch(remaining_seconds: i64, threshold_seconds: i64) -> bool {
    remaining_seconds < threshold_seconds
}

/// The top-level entry point for every lookup variant (spec §4.2 `Lookup
/// Service`).
#[derive(Clone)]
pub struct LookupService {
    inner: Arc<LookupInner>,
    stage: Stage,
}

impl LookupService {
    pub fn new(registry: ProviderRegistry, manager: ProviderManager, trust: Arc<TrustTable>, cache: IpCache, db: IpDb, llm: Arc<LlmEnricher>, settings: Arc<Settings>) -> Self {
        let providers: Vec<Arc<Provider>> = registry.providers().iter().cloned().map(Arc::new).collect();
        let bulk_limiter = KeyedSlidingWindowLimiter::new(settings.bulk_rate_limit_ips_per_minute as usize, Duration::from_secs(60));

        let inner = Arc::new(LookupInner { providers, registry, manager, trust, cache, db, llm, settings, background: BackgroundSink::new(BACKGROUND_SINK_CAPACITY), bulk_limiter });

        let stage_service = ProviderStageService { inner: Arc::clone(&inner) };
        let layer: StageLayer = CoalesceLayer::new(extract_key as fn(&CoalesceKey) -> CoalesceKey);
        let stage = layer.layer(stage_service);

        Self { inner, stage }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    /// Periodically sweeps stale per-requester rate-limit windows. Intended
    /// to run on an interval from the binary's startup wiring, never on the
    /// request path.
    pub fn sweep_rate_limits(&self) {
        self.inner.bulk_limiter.sweep();
    }

    /// Spec §4.5 steps 1-9, single-IP lookup.
    pub async fn lookup(&self, input: &str, force_refresh: bool, include_llm: bool) -> Result<(CorrelatedIpRecord, Option<ResolvedFrom>), LookupError> {
        let (normalized, resolved_from) = self.normalize_or_resolve(input).await?;
        let ip = normalized.as_str().to_string();

        if !force_refresh {
            if let Some(mut record) = self.inner.cache.get(&ip).await.unwrap_or(None) {
                self.touch_if_stale(&ip, &mut record).await;
                record.metadata.source = RecordSource::Cache;
                self.enrich_if_requested(include_llm, &mut record).await;
                return Ok((record, resolved_from));
            }

            if let Some(mut record) = self.inner.db.get(&ip).await.unwrap_or(None) {
                if !record.is_expired(Utc::now()) {
                    record.metadata.source = RecordSource::Db;
                    if let Err(e) = self.inner.cache.set(&ip, &record, self.inner.settings.cache_ttl_seconds).await {
                        tracing::warn!(ip, error = %e, "failed to populate cache from database hit");
                    }
                    self.enrich_if_requested(include_llm, &mut record).await;
                    return Ok((record, resolved_from));
                }
            }
        }

        let key = CoalesceKey { ip, force_refresh, include_llm };
        let mut stage = self.stage.clone();
        let record = match stage.ready().await {
            Ok(ready) => ready.call(key).await,
            Err(e) => Err(e),
        }
        .map_err(flatten_coalesce_error)?;

        Ok((record, resolved_from))
    }

    async fn touch_if_stale(&self, ip: &str, record: &mut CorrelatedIpRecord) {
        let now = Utc::now();
        let remaining = (record.metadata.expires_at - now).num_seconds();
        if needs_touch(remaining, self.inner.settings.cache_refresh_threshold_seconds) {
            record.touch_ttl(self.inner.settings.cache_ttl_seconds, now);
            if let Err(e) = self.inner.cache.set(ip, record, self.inner.settings.cache_ttl_seconds).await {
                tracing::warn!(ip, error = %e, "failed to extend cache ttl on touch");
            }
        }
    }

    async fn enrich_if_requested(&self, include_llm: bool, record: &mut CorrelatedIpRecord) {
        if include_llm && self.inner.settings.llm_enabled && record.metadata.llm_analysis.is_none() {
            if let Some(analysis) = self.inner.llm.analyze(record).await {
                record.metadata.llm_analysis = Some(analysis);
            }
        }
    }

    /// Spec §4.5 step 1: syntactic IPs skip resolution; anything else gets
    /// one A-record lookup before falling into the normal pipeline.
    async fn normalize_or_resolve(&self, input: &str) -> Result<(ip::NormalizedIp, Option<ResolvedFrom>), LookupError> {
        if ip::looks_like_ip(input) {
            return Ok((ip::normalize(input)?, None));
        }
        let resolved_ip = self.resolve_a_record(input).await?;
        let normalized = ip::normalize(&resolved_ip)?;
        let resolved_from = ResolvedFrom { hostname: input.to_string(), resolved_ip: normalized.as_str().to_string() };
        Ok((normalized, Some(resolved_from)))
    }

    async fn resolve_a_record(&self, hostname: &str) -> Result<String, LookupError> {
        let target = format!("{hostname}:0");
        let addrs: Vec<_> = tokio::net::lookup_host(&target).await.map_err(|_| LookupError::dns_resolution_failed(hostname))?.collect();
        addrs.iter().find(|a| a.is_ipv4()).or_else(|| addrs.first()).map(|a| a.ip().to_string()).ok_or_else(|| LookupError::dns_resolution_failed(hostname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_keys_differ_by_every_field() {
        let a = CoalesceKey { ip: "8.8.8.8".to_string(), force_refresh: false, include_llm: false };
        let b = CoalesceKey { ip: "8.8.8.8".to_string(), force_refresh: true, include_llm: false };
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn touch_threshold_triggers_below_but_not_above() {
        assert!(needs_touch(100, 200));
        assert!(!needs_touch(300, 200));
        assert!(!needs_touch(200, 200));
    }

    #[test]
    fn leader_cancelled_and_recv_error_become_an_internal_error() {
        let err = flatten_coalesce_error(CoalesceError::LeaderCancelled);
        assert_eq!(err.code, ipintel_core::ErrorCode::InternalError);
        let err = flatten_coalesce_error(CoalesceError::RecvError);
        assert_eq!(err.code, ipintel_core::ErrorCode::InternalError);
    }

    #[test]
    fn service_errors_pass_through_unchanged() {
        let inner = LookupError::rate_limit_exceeded(5);
        let err = flatten_coalesce_error(CoalesceError::Service(inner.clone()));
        assert_eq!(err.code, inner.code);
    }
}
