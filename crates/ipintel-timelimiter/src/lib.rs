//! Advanced timeout handling for Tower services.
//!
//! Provides timeout functionality with:
//! - Configurable timeout duration
//! - Optional future cancellation on timeout
//! - Event system for observability (onSuccess, onError, onTimeout)
//! - Metrics integration
//!
//! ## Basic Example
//!
//! ```rust
//! use ipintel_timelimiter::TimeLimiterConfig;
//! use tower::{Layer, service_fn};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let layer = TimeLimiterConfig::builder()
//!     .timeout_duration(Duration::from_secs(5))
//!     .cancel_running_future(true)
//!     .on_timeout(|| {
//!         eprintln!("Request timed out!");
//!     })
//!     .build()
//!     .layer();
//!
//! let svc = service_fn(|req: String| async move {
//!     Ok::<String, ()>(req)
//! });
//!
//! let mut service = layer.layer(svc);
//! # }
//! ```
//!
//! ## Event Listeners
//!
//! ```rust
//! use ipintel_timelimiter::TimeLimiterConfig;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let layer = TimeLimiterConfig::builder()
//!     .timeout_duration(Duration::from_secs(5))
//!     .on_success(|duration| {
//!         println!("Call succeeded in {:?}", duration);
//!     })
//!     .on_error(|duration| {
//!         println!("Call failed after {:?}", duration);
//!     })
//!     .on_timeout(|| {
//!         println!("Call timed out");
//!     })
//!     .build();
//! # }
//! ```

use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::time::timeout;
use tower::Service;

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder};
pub use error::TimeLimiterError;
pub use events::TimeLimiterEvent;
pub use layer::TimeLimiterLayer;

mod config;
mod error;
mod events;
mod layer;

/// A Tower service that applies timeout limiting to an inner service.
///
/// Generic over the request type because the timeout for a given call may be
/// drawn from the request itself (see [`config::TimeoutSource::Dynamic`]) —
/// this is how a provider's configured `timeoutMs` reaches the time limiter
/// without a separate per-provider layer.
pub struct TimeLimiter<S, Req> {
    inner: S,
    config: Arc<TimeLimiterConfig<Req>>,
    _marker: PhantomData<Req>,
}

impl<S, Req> TimeLimiter<S, Req> {
    /// Creates a new time limiter wrapping the given service.
    pub(crate) fn new(
        inner: S,
        config: Arc<TimeLimiterConfig<Req>>,
        _marker: PhantomData<Req>,
    ) -> Self {
        Self {
            inner,
            config,
            _marker,
        }
    }
}

impl<S, Req> Clone for TimeLimiter<S, Req>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            _marker: PhantomData,
        }
    }
}

impl<S, Request> Service<Request> for TimeLimiter<S, Request>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = TimeLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(TimeLimiterError::Inner)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = Arc::clone(&self.config);
        let timeout_duration = config.timeout_source.get_timeout(&req);

        Box::pin(async move {
            let start = Instant::now();

            match timeout(timeout_duration, inner.call(req)).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Success {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });
                    Ok(response)
                }
                Ok(Err(err)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Error {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });
                    Err(TimeLimiterError::Inner(err))
                }
                Err(_elapsed) => {
                    config.event_listeners.emit(&TimeLimiterEvent::Timeout {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        timeout_duration,
                    });
                    Err(TimeLimiterError::Timeout)
                }
            }
        })
    }
}
