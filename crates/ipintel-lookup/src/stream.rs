//! The streaming lookup (spec §4.6): the same pipeline as `lookup()`,
//! delivered as an ordered event stream instead of a single response.
//!
//! Deliberately a separate code path from the coalescing-wrapped
//! `LookupService::lookup`: per-caller progress events are inherently
//! per-consumer, and coalescing two streaming callers into one shared
//! provider fan-out would mean one of them silently skips its own
//! `provider_complete` events. Cache and database short-circuits are
//! shared with the plain lookup path; only the live fan-out has its own
//! event-emitting version here.

use crate::LookupService;
use chrono::Utc;
use futures::Stream;
use ipintel_core::model::{CorrelatedIpRecord, ProviderProgress, RecordSource};
use ipintel_core::LookupError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Spec §4.6's ordered event set.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum LookupEvent {
    #[serde(rename = "lookup_start")]
    LookupStart { ip: String, total: usize },
    #[serde(rename = "provider_complete")]
    ProviderComplete { provider: String, success: bool, index: usize, total: usize },
    #[serde(rename = "correlation_complete")]
    CorrelationComplete { data: CorrelatedIpRecord },
    #[serde(rename = "llm_start")]
    LlmStart {},
    #[serde(rename = "lookup_complete")]
    LookupComplete { data: CorrelatedIpRecord, cached: bool },
    #[serde(rename = "lookup_error")]
    LookupError { error: LookupError },
}

impl LookupService {
    /// `disconnected` is flipped by the caller (the HTTP layer) once the
    /// underlying connection closes; further emission short-circuits, but
    /// background persistence still runs to completion (spec §4.6
    /// "Client-disconnect").
    pub fn lookup_stream(&self, input: String, force_refresh: bool, include_llm: bool, disconnected: Arc<AtomicBool>) -> impl Stream<Item = LookupEvent> + Send + 'static {
        let service = self.clone();
        async_stream::stream! {
            if disconnected.load(Ordering::Relaxed) {
                return;
            }

            let (normalized, _resolved_from) = match service.normalize_or_resolve(&input).await {
                Ok(v) => v,
                Err(error) => {
                    yield LookupEvent::LookupError { error };
                    return;
                }
            };
            let ip = normalized.as_str().to_string();

            if !force_refresh {
                if let Some(mut record) = service.inner.cache.get(&ip).await.unwrap_or(None) {
                    service.touch_if_stale(&ip, &mut record).await;
                    record.metadata.source = RecordSource::Cache;
                    service.enrich_if_requested(include_llm, &mut record).await;
                    if !disconnected.load(Ordering::Relaxed) {
                        yield LookupEvent::LookupComplete { data: record, cached: true };
                    }
                    return;
                }

                if let Some(mut record) = service.inner.db.get(&ip).await.unwrap_or(None) {
                    if !record.is_expired(Utc::now()) {
                        record.metadata.source = RecordSource::Db;
                        let _ = service.inner.cache.set(&ip, &record, service.inner.settings.cache_ttl_seconds).await;
                        service.enrich_if_requested(include_llm, &mut record).await;
                        if !disconnected.load(Ordering::Relaxed) {
                            yield LookupEvent::LookupComplete { data: record, cached: true };
                        }
                        return;
                    }
                }
            }

            let providers = &service.inner.providers;
            let total = providers.iter().filter(|p| p.config.enabled).count();
            if !disconnected.load(Ordering::Relaxed) {
                yield LookupEvent::LookupStart { ip: ip.clone(), total };
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProviderProgress>();
            let progress: Arc<dyn Fn(ProviderProgress) + Send + Sync> = Arc::new(move |p| {
                let _ = tx.send(p);
            });

            let global_timeout_ms = service.inner.settings.lookup_global_timeout_ms;
            let query = service.inner.manager.query_all(providers, &ip, global_timeout_ms, Some(progress));
            tokio::pin!(query);

            let mut results = None;
            while results.is_none() {
                tokio::select! {
                    biased;
                    progress_event = rx.recv() => {
                        if let Some(p) = progress_event {
                            if !disconnected.load(Ordering::Relaxed) {
                                yield LookupEvent::ProviderComplete { provider: p.provider, success: p.success, index: p.index, total: p.total };
                            }
                        }
                    }
                    r = &mut query, if results.is_none() => {
                        results = Some(r);
                    }
                }
            }
            while let Ok(p) = rx.try_recv() {
                if !disconnected.load(Ordering::Relaxed) {
                    yield LookupEvent::ProviderComplete { provider: p.provider, success: p.success, index: p.index, total: p.total };
                }
            }

            let results = results.unwrap();
            service.inner.record_daily_stats(&results);

            let succeeded = results.iter().filter(|r| r.success).count();
            if succeeded == 0 {
                if !disconnected.load(Ordering::Relaxed) {
                    yield LookupEvent::LookupError { error: LookupError::providers_unavailable() };
                }
                return;
            }

            let now = Utc::now();
            let mut record = ipintel_correlation::correlate(&ip, &results, &service.inner.trust, RecordSource::Live, service.inner.settings.cache_ttl_seconds, now);

            if disconnected.load(Ordering::Relaxed) {
                service.inner.persist(&record).await;
                return;
            }
            yield LookupEvent::CorrelationComplete { data: record.clone() };

            if include_llm && service.inner.settings.llm_enabled {
                if !disconnected.load(Ordering::Relaxed) {
                    yield LookupEvent::LlmStart {};
                }
                if let Some(analysis) = service.inner.llm.analyze(&record).await {
                    record.metadata.llm_analysis = Some(analysis);
                }
            }

            service.inner.persist(&record).await;

            if !disconnected.load(Ordering::Relaxed) {
                yield LookupEvent::LookupComplete { data: record, cached: false };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_match_the_documented_sse_names() {
        let event = LookupEvent::LlmStart {};
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "llm_start");
    }
}
