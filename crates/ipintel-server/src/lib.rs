//! Axum HTTP surface for the ipintel aggregator (spec §6 "HTTP Interface").
//!
//! This crate owns everything that talks HTTP: request/response shapes,
//! status-code mapping, CORS, and tracing. It holds no business logic of
//! its own — every handler is a thin adapter over `ipintel_lookup::LookupService`
//! and the two durable stores.
//!
//! TODO: no `/metrics` route yet. Admin API-key management, a Prometheus
//! exporter, and Sentry breadcrumbs are glue the spec explicitly leaves
//! unspecified; wiring `metrics-exporter-prometheus` behind a feature flag
//! is the concrete next step if that glue is ever needed.

mod admin;
mod error;
mod handlers;
mod health;
mod stream;

pub use error::ApiError;
pub use health::{build_store_health, StoreHealth};

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use ipintel_cache::IpCache;
use ipintel_core::config::Settings;
use ipintel_db::IpDb;
use ipintel_llm::LlmEnricher;
use ipintel_lookup::LookupService;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler. Cheap to clone: everything inside
/// is already `Arc`- or pool-backed.
pub struct AppState {
    pub lookup: LookupService,
    pub cache: IpCache,
    pub db: IpDb,
    pub llm: Arc<LlmEnricher>,
    pub store_health: StoreHealth,
    pub settings: Arc<Settings>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(lookup: LookupService, cache: IpCache, db: IpDb, llm: Arc<LlmEnricher>, store_health: StoreHealth, settings: Arc<Settings>) -> Self {
        Self { lookup, cache, db, llm, store_health, settings, started_at: Instant::now() }
    }
}

/// Assembles the full router (spec §6's endpoint table plus the
/// SPEC_FULL §10 admin surface), with CORS and request tracing applied the
/// same way the teacher layers its middleware stack: innermost first.
pub fn build_router(state: Arc<AppState>) -> Router<()> {
    let admin_routes = Router::new()
        .route("/api/v1/providers", get(admin::list_providers))
        .route("/api/v1/providers/{name}/reset", post(admin::reset_provider))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), admin_auth_middleware));

    Router::new()
        .route("/api/v1/lookup", post(handlers::lookup_post))
        .route("/api/v1/lookup/{ip}", get(handlers::lookup_get))
        .route("/api/v1/lookup/bulk", post(handlers::lookup_bulk))
        .route("/api/v1/lookup/cidr", post(handlers::lookup_cidr))
        .route("/api/v1/lookup/stream", get(stream::lookup_stream))
        .route("/api/health", get(health::health_handler))
        .route("/api/health/live", get(health::live_handler))
        .route("/api/health/ready", get(health::ready_handler))
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Gates the admin surface behind `ADMIN_API_KEY` when one is configured
/// (spec.md: "Admin API-key management ... is glue and not specified" —
/// this is the minimal glue that field implies, nothing more elaborate).
async fn admin_auth_middleware(axum::extract::State(state): axum::extract::State<Arc<AppState>>, headers: HeaderMap, request: Request, next: Next) -> Result<Response, StatusCode> {
    if let Some(expected) = &state.settings.admin_api_key {
        let provided = headers.get("authorization").and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));
        match provided {
            Some(key) if key == expected => {}
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    }
    Ok(next.run(request).await)
}

/// Background loops the request path never waits on (SPEC_FULL §10):
/// sweeping stale per-requester rate-limit windows and reaping expired
/// cache/database rows. Spawned once from the binary's startup wiring.
pub fn spawn_background_tasks(state: Arc<AppState>) {
    let sweep_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sweep_state.lookup.sweep_rate_limits();
        }
    });

    let cleanup_state = state;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            let grace_days = cleanup_state.settings.db_cleanup_grace_days;
            match cleanup_state.db.cleanup_expired(grace_days, chrono::Utc::now()).await {
                Ok(deleted) => {
                    if deleted > 0 {
                        tracing::info!(deleted, "cleaned up expired database records");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "database cleanup sweep failed"),
            }
        }
    });
}
