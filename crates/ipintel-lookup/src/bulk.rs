//! Bulk and CIDR lookup (spec §4.5 "Bulk lookup", "CIDR lookup").

use crate::cidr;
use crate::LookupService;
use futures::stream::{self, StreamExt};
use ipintel_core::model::{BulkItemResult, BulkLookupResponse, BulkSummary, CidrLookupResponse};
use ipintel_core::{ip, LookupError};
use std::time::Instant;

/// Validates every IP upfront; a single failure fails the whole batch (spec
/// §4.5 "Validates all upfront; on any validation error, fail the whole
/// batch with `INVALID_IPS`").
fn validate_all(ips: &[String]) -> Result<(), LookupError> {
    let details: Vec<String> = ips.iter().filter_map(|candidate| ip::normalize(candidate).err().map(|e| format!("{candidate}: {}", e.message))).collect();
    if details.is_empty() {
        Ok(())
    } else {
        Err(LookupError::invalid_ips(details))
    }
}

async fn run_batch(service: &LookupService, ips: Vec<String>, force_refresh: bool, include_llm: bool, concurrency: usize) -> Vec<BulkItemResult> {
    stream::iter(ips.into_iter().map(|ip| {
        let service = service.clone();
        async move {
            match service.lookup(&ip, force_refresh, include_llm).await {
                Ok((record, _)) => BulkItemResult { ip, success: true, data: Some(record), error: None },
                Err(e) => BulkItemResult { ip, success: false, data: None, error: Some(e.message) },
            }
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

/// `results` already contains one entry per host attempted, including
/// validation failures unioned in by the caller (spec §4.5 "union the
/// validation errors into the results") — `skipped` is carried through only
/// for the summary's own `skipped` field and must not be added to `total`
/// again, or skipped hosts would be double-counted.
fn summarize(results: &[BulkItemResult], skipped: Option<usize>, processing_time_ms: u64) -> BulkSummary {
    let successful = results.iter().filter(|r| r.success).count();
    BulkSummary { total: results.len(), successful, failed: results.len() - successful, skipped, processing_time_ms }
}

impl LookupService {
    /// Spec §4.5 "Bulk lookup": up to `BULK_MAX_IPS`, validated upfront,
    /// executed through a bounded concurrency limit. Never throws for
    /// per-IP failures — they come back as `{ip, success=false, error}`.
    pub async fn bulk_lookup(&self, ips: Vec<String>, force_refresh: bool, include_llm: bool, requester: &str) -> Result<BulkLookupResponse, LookupError> {
        if ips.is_empty() || ips.len() > self.inner.settings.bulk_max_ips {
            return Err(LookupError::too_many_ips(ips.len(), self.inner.settings.bulk_max_ips));
        }
        self.check_bulk_rate_limit(requester, ips.len())?;
        validate_all(&ips)?;

        let started = Instant::now();
        let results = run_batch(self, ips, force_refresh, include_llm, self.inner.settings.bulk_concurrency).await;
        let summary = summarize(&results, None, started.elapsed().as_millis() as u64);
        Ok(BulkLookupResponse { results, summary })
    }

    /// Spec §4.5 "CIDR lookup": expand deterministically, validate each
    /// host, union validation errors into the results, run bulk lookup on
    /// the remainder.
    pub async fn cidr_lookup(&self, cidr_input: &str, force_refresh: bool, include_llm: bool, requester: &str) -> Result<CidrLookupResponse, LookupError> {
        let (info, hosts) = cidr::expand(cidr_input, self.inner.settings.cidr_max_hosts)?;
        self.check_bulk_rate_limit(requester, hosts.len())?;

        let mut invalid = Vec::new();
        let mut valid = Vec::new();
        for host in hosts {
            match ip::normalize(&host) {
                Ok(_) => valid.push(host),
                Err(e) => invalid.push(BulkItemResult { ip: host, success: false, data: None, error: Some(e.message) }),
            }
        }

        let started = Instant::now();
        let skipped = invalid.len();
        let mut results = run_batch(self, valid, force_refresh, include_llm, self.inner.settings.bulk_concurrency).await;
        results.extend(invalid);

        let summary = summarize(&results, Some(skipped), started.elapsed().as_millis() as u64);
        Ok(CidrLookupResponse { cidr: info, results, summary })
    }

    fn check_bulk_rate_limit(&self, requester: &str, cost: usize) -> Result<(), LookupError> {
        self.inner.bulk_limiter.try_acquire(requester.to_string(), cost).map_err(|retry_after| LookupError::rate_limit_exceeded(retry_after.as_secs().max(1)))
    }
}
