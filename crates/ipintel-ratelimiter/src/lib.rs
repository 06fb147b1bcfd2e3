//! Advanced rate limiting middleware for Tower services.
//!
//! This crate provides enhanced rate limiting inspired by Resilience4j's RateLimiter,
//! with features beyond Tower's built-in rate limiting.
//!
//! # Features
//!
//! - **Permit-based rate limiting**: Control requests per time period
//! - **Configurable timeout**: Wait up to a specified duration for permits
//! - **Automatic refresh**: Permits automatically refresh after each period
//! - **Event system**: Observability through rate limiter events
//!
//! # Examples
//!
//! ```
//! use ipintel_ratelimiter::RateLimiterConfig;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Allow 100 requests per second, wait up to 500ms for a permit
//! let rate_limiter = RateLimiterConfig::builder()
//!     .limit_for_period(100)
//!     .refresh_period(Duration::from_secs(1))
//!     .timeout_duration(Duration::from_millis(500))
//!     .on_permit_acquired(|wait_duration| {
//!         println!("Permit acquired after {:?}", wait_duration);
//!     })
//!     .on_permit_rejected(|timeout| {
//!         println!("Rate limited! Timeout: {:?}", timeout);
//!     })
//!     .build();
//!
//! // Apply to a service
//! let service = ServiceBuilder::new()
//!     .layer(rate_limiter)
//!     .service(tower::service_fn(|req: String| async move {
//!         Ok::<_, std::io::Error>(format!("Response: {}", req))
//!     }));
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod keyed;
mod layer;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use keyed::KeyedSlidingWindowLimiter;
pub use layer::RateLimiterLayer;

use crate::limiter::SharedRateLimiter;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

/// A Tower [`Service`] that applies rate limiting.
///
/// This service wraps an inner service and limits the rate at which
/// requests can be processed according to the configured policy.
pub struct RateLimiter<S> {
    inner: S,
    config: Arc<RateLimiterConfig>,
    limiter: SharedRateLimiter,
}

impl<S> RateLimiter<S> {
    /// Creates a new `RateLimiter` wrapping the given service.
    pub fn new(inner: S, config: Arc<RateLimiterConfig>) -> Self {
        let limiter = SharedRateLimiter::new(
            config.limit_for_period,
            config.refresh_period,
            config.timeout_duration,
        );

        Self {
            inner,
            config,
            limiter,
        }
    }
}

impl<S> Clone for RateLimiter<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            limiter: self.limiter.clone(),
        }
    }
}

impl<S, Req> Service<Req> for RateLimiter<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimiterError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|_| RateLimiterError::RateLimitExceeded)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Try to acquire a permit
            match limiter.acquire().await {
                Ok(wait_duration) => {
                    // Permit acquired
                    let event = RateLimiterEvent::PermitAcquired {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        wait_duration,
                    };
                    config.event_listeners.emit(&event);

                    // Process the request
                    inner
                        .call(req)
                        .await
                        .map_err(|_| RateLimiterError::RateLimitExceeded)
                }
                Err(()) => {
                    // Rate limited
                    let event = RateLimiterEvent::PermitRejected {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        timeout_duration: config.timeout_duration,
                    };
                    config.event_listeners.emit(&event);

                    Err(RateLimiterError::RateLimitExceeded)
                }
            }
        })
    }
}
