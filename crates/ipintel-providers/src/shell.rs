//! The provider shell (spec §4.1): the uniform, non-adapter behavior every
//! provider gets for free — circuit breaker, retry-with-backoff, timeout
//! composition, metrics, and the "never throws" guarantee.
//!
//! Built as a Tower stack, the same way the teacher composes its own
//! layers: `breaker(retry(timelimiter(adapter)))`, so a single breaker
//! execution encompasses every retry attempt (spec §4.1).

use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use ipintel_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer, CircuitMetrics};
use ipintel_core::model::{ProviderConfig, ProviderResult};
use ipintel_retry::RetryLayer;
use ipintel_timelimiter::{TimeLimiterError, TimeLimiterLayer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};

/// Request shape threaded through the whole stack: the IP to look up plus
/// the linked cancellation token (global deadline ∨ per-provider timeout,
/// spec §4.1).
type Req = (String, CancellationToken);

type StackError = TimeLimiterError<AdapterError>;
type Stack = BoxCloneService<Req, PartialResult, StackError>;

/// Adapts a `dyn ProviderAdapter` into a `tower::Service` so it can sit at
/// the bottom of the resilience stack.
#[derive(Clone)]
struct AdapterService {
    adapter: Arc<dyn ProviderAdapter>,
    api_key: Option<String>,
}

impl Service<Req> for AdapterService {
    type Response = PartialResult;
    type Error = AdapterError;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, (ip, cancel): Req) -> Self::Future {
        let adapter = Arc::clone(&self.adapter);
        let api_key = self.api_key.clone();
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AdapterError::Cancelled),
                result = adapter.perform_lookup(&ip, api_key.as_deref(), cancel.clone()) => result,
            }
        })
    }
}

/// A single provider wrapped in its full resilience shell. Every public
/// method is infallible at the Rust type level in the sense that matters:
/// `lookup` always returns a `ProviderResult`, never a `Result`/panic.
#[derive(Clone)]
pub struct Provider {
    pub config: Arc<ProviderConfig>,
    adapter_name: String,
    stack: CircuitBreaker<Stack>,
}

impl Provider {
    pub fn new(config: ProviderConfig, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let config = Arc::new(config);
        let adapter_name = adapter.name().to_string();

        let adapter_svc = AdapterService { adapter, api_key: config.api_key.clone() };

        let timelimiter = TimeLimiterLayer::<Req>::builder()
            .timeout_duration(Duration::from_millis(config.timeout_ms))
            .build();
        let limited = timelimiter.layer(adapter_svc);

        let retry = RetryLayer::<Req, StackError>::builder()
            .name(format!("{}-retry", config.name))
            .max_attempts(config.retries + 1)
            .exponential_random_backoff(Duration::from_millis(config.retry_delay_ms), Duration::from_secs(30))
            .retry_on(|e: &StackError| !matches!(e, TimeLimiterError::Inner(AdapterError::Cancelled)))
            .cancellable(|req: &Req| req.1.clone(), || TimeLimiterError::Inner(AdapterError::Cancelled))
            .build();
        let retried = retry.layer(limited);

        let boxed: Stack = BoxCloneService::new(retried);

        let breaker = CircuitBreakerLayer::builder()
            .name(config.name.clone())
            .failure_threshold(5)
            .reset_timeout(Duration::from_secs(60))
            .half_open_attempts(1)
            .build();
        let stack = breaker.layer(boxed);

        Self { config, adapter_name, stack }
    }

    /// Override the default breaker thresholds with process-wide settings
    /// (spec §6 `CIRCUIT_BREAKER_*` env vars).
    pub fn with_breaker_settings(
        config: ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_attempts: u32,
    ) -> Self {
        let config_arc = Arc::new(config);
        let adapter_name = adapter.name().to_string();
        let adapter_svc = AdapterService { adapter, api_key: config_arc.api_key.clone() };

        let timelimiter = TimeLimiterLayer::<Req>::builder()
            .timeout_duration(Duration::from_millis(config_arc.timeout_ms))
            .build();
        let limited = timelimiter.layer(adapter_svc);

        let retry = RetryLayer::<Req, StackError>::builder()
            .name(format!("{}-retry", config_arc.name))
            .max_attempts(config_arc.retries + 1)
            .exponential_random_backoff(Duration::from_millis(config_arc.retry_delay_ms), Duration::from_secs(30))
            .retry_on(|e: &StackError| !matches!(e, TimeLimiterError::Inner(AdapterError::Cancelled)))
            .cancellable(|req: &Req| req.1.clone(), || TimeLimiterError::Inner(AdapterError::Cancelled))
            .build();
        let retried = retry.layer(limited);
        let boxed: Stack = BoxCloneService::new(retried);

        let breaker = CircuitBreakerLayer::builder()
            .name(config_arc.name.clone())
            .failure_threshold(failure_threshold)
            .reset_timeout(reset_timeout)
            .half_open_attempts(half_open_attempts)
            .build();
        let stack = breaker.layer(boxed);

        Self { config: config_arc, adapter_name, stack }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current circuit breaker snapshot, for the `/api/v1/providers` admin
    /// surface (SPEC_FULL §10).
    pub fn breaker_metrics(&self) -> CircuitMetrics {
        self.stack.metrics()
    }

    pub fn is_healthy(&self) -> bool {
        self.stack.is_healthy()
    }

    pub fn reset_breaker(&self) {
        self.stack.reset();
    }

    /// Query this provider for `ip`. Never throws: disabled providers,
    /// breaker rejections, retry exhaustion, and cancellation are all
    /// folded into a `success: false` result (spec §4.1 responsibility 5).
    pub async fn lookup(&self, ip: &str, cancel: CancellationToken) -> ProviderResult {
        if !self.config.enabled {
            return ProviderResult::disabled(self.adapter_name.clone());
        }

        let started = Instant::now();
        let mut stack = self.stack.clone();
        let result = match stack.ready().await {
            Ok(svc) => svc.call((ip.to_string(), cancel)).await,
            Err(e) => Err(e),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(partial) => {
                metrics::counter!("requests_total", "provider" => self.adapter_name.clone(), "status" => "success").increment(1);
                ProviderResult {
                    provider: self.adapter_name.clone(),
                    success: true,
                    latency_ms,
                    error: None,
                    asn: partial.asn,
                    org: partial.org,
                    country: partial.country,
                    region: partial.region,
                    city: partial.city,
                    latitude: partial.latitude,
                    longitude: partial.longitude,
                    timezone: partial.timezone,
                    is_proxy: partial.is_proxy,
                    is_vpn: partial.is_vpn,
                    is_tor: partial.is_tor,
                    is_hosting: partial.is_hosting,
                    is_mobile: partial.is_mobile,
                    vpn_provider: partial.vpn_provider,
                    abuse_score: partial.abuse_score,
                    last_seen: None,
                    raw: partial.raw,
                }
            }
            Err(err) => {
                metrics::counter!("requests_total", "provider" => self.adapter_name.clone(), "status" => "error").increment(1);
                let message = describe_error(&err);
                tracing::debug!(provider = %self.adapter_name, error = %message, "provider lookup failed");
                ProviderResult::failure(self.adapter_name.clone(), latency_ms, message)
            }
        }
    }
}

/// Flattens the nested `CircuitBreakerError<TimeLimiterError<AdapterError>>`
/// into the single human-readable message the spec requires as
/// `ProviderResult.error` (spec §4.2 breaker rejection message:
/// `"Circuit breaker OPEN for {name}"`).
fn describe_error(err: &ipintel_circuitbreaker::CircuitBreakerError<StackError>) -> String {
    match err {
        ipintel_circuitbreaker::CircuitBreakerError::Open { name, .. } => {
            format!("Circuit breaker OPEN for {name}")
        }
        ipintel_circuitbreaker::CircuitBreakerError::Inner(TimeLimiterError::Timeout) => {
            "request timed out".to_string()
        }
        ipintel_circuitbreaker::CircuitBreakerError::Inner(TimeLimiterError::Inner(adapter_err)) => {
            adapter_err.to_string()
        }
    }
}
