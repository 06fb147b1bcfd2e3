//! The Provider Manager (spec §4.3): bounded-concurrency fan-out across
//! every enabled provider under a single global deadline, with exactly-once
//! per-progress callbacks and results returned in registration order.
//!
//! Grounded on `ipintel-bulkhead`'s semaphore-backed `Bulkhead<S>` Tower
//! service, generalized from "one service, N requests" to "one shared
//! concurrency budget, N distinct provider calls" by making the call target
//! part of the request type.

use futures::future::BoxFuture;
use ipintel_bulkhead::{BulkheadError, BulkheadLayer};
use ipintel_core::model::{ProviderProgress, ProviderResult};
use ipintel_providers::Provider;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service, ServiceExt};

/// `(provider, ip, linked cancellation token)` — the unit of work the
/// shared bulkhead bounds. Each task supplies a different `provider`, so
/// the single semaphore caps the number of *distinct outbound provider
/// calls* in flight, not calls to any one provider (spec §5 "At most
/// `PROVIDER_CONCURRENCY` concurrent outbound HTTP calls across all
/// providers").
type ManagerRequest = (Arc<Provider>, String, CancellationToken);

#[derive(Clone)]
struct CallProvider;

impl Service<ManagerRequest> for CallProvider {
    type Response = ProviderResult;
    type Error = BulkheadError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (provider, ip, cancel): ManagerRequest) -> Self::Future {
        Box::pin(async move { Ok(provider.lookup(&ip, cancel).await) })
    }
}

/// Cancels `token` when dropped, including on early return or panic — the
/// Rust shape of spec §4.3 step 1's "store a deferred cleanup that cancels
/// this token on return".
struct CancelGuard(CancellationToken);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Fan-out executor over a fixed set of providers (spec §4.3).
pub struct ProviderManager {
    bulkhead: ipintel_bulkhead::Bulkhead<CallProvider>,
}

impl ProviderManager {
    /// `concurrency` is `PROVIDER_CONCURRENCY` (spec §6, default 4).
    pub fn new(concurrency: usize) -> Self {
        let layer = BulkheadLayer::builder().max_concurrent_calls(concurrency).name("provider-manager").build();
        Self { bulkhead: layer.layer(CallProvider) }
    }

    /// Queries every *enabled* provider in `providers` for `ip`, returning
    /// one `ProviderResult` per enabled provider in the same relative order
    /// they appear in `providers` (spec §4.3 "return the array aligned with
    /// registration order"), regardless of completion order.
    ///
    /// `progress`, if given, is invoked exactly once per provider as its
    /// task settles, in completion order, with a strictly increasing
    /// `index` (spec §4.3 step 3).
    pub async fn query_all(
        &self,
        providers: &[Arc<Provider>],
        ip: &str,
        global_timeout_ms: u64,
        progress: Option<Arc<dyn Fn(ProviderProgress) + Send + Sync>>,
    ) -> Vec<ProviderResult> {
        let enabled: Vec<(usize, Arc<Provider>)> =
            providers.iter().enumerate().filter(|(_, p)| p.config.enabled).map(|(i, p)| (i, Arc::clone(p))).collect();
        let total = enabled.len();

        let token = CancellationToken::new();
        let _cancel_on_return = CancelGuard(token.clone());

        let timer_token = token.clone();
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(global_timeout_ms)) => timer_token.cancel(),
                _ = timer_token.cancelled() => {}
            }
        });

        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(total);
        for (slot, provider) in enabled {
            let mut svc = self.bulkhead.clone();
            let ip = ip.to_string();
            let cancel = token.clone();
            let completed = Arc::clone(&completed);
            let progress = progress.clone();
            handles.push((
                slot,
                tokio::spawn(async move {
                    let fallback_name = provider.name().to_string();
                    let result = match svc.ready().await {
                        Ok(ready) => ready.call((Arc::clone(&provider), ip, cancel)).await,
                        Err(e) => Err(e),
                    }
                    .unwrap_or_else(|e| ProviderResult::failure(fallback_name, 0, e.to_string()));

                    let index = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = &progress {
                        cb(ProviderProgress { provider: result.provider.clone(), success: result.success, index, total });
                    }
                    result
                }),
            ));
        }

        let mut slots: Vec<Option<ProviderResult>> = (0..providers.len()).map(|_| None).collect();
        for (slot, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                // A panicking adapter task still settles as a failed result
                // (spec §4.3 step 3: "the task boundary converts any thrown
                // error into a synthetic `ProviderResult`").
                Err(join_err) => ProviderResult::failure("unknown", 0, format!("provider task panicked: {join_err}")),
            };
            slots[slot] = Some(result);
        }

        drop(_cancel_on_return);
        let _ = timer.await;
        slots.into_iter().flatten().collect()
    }
}
