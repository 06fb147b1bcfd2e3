//! `/api/health*` (spec §6): liveness, readiness, and the overall status
//! rollup. Redis and Postgres health is checked *proactively*, not on the
//! request path — grounded on `ipintel-healthcheck`'s background
//! `HealthCheckWrapper` rather than pinging both stores on every request.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ipintel_healthcheck::{HealthCheckWrapper, HealthStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// The two durable-tier resources this process proactively monitors.
pub const RESOURCE_REDIS: &str = "redis";
pub const RESOURCE_POSTGRES: &str = "postgres";

pub type StoreHealth = HealthCheckWrapper<&'static str, StoreChecker>;

/// Dispatches a background health probe by resource name to the matching
/// store's own cheap `ping`.
pub struct StoreChecker {
    pub cache: ipintel_cache::IpCache,
    pub db: ipintel_db::IpDb,
}

impl ipintel_healthcheck::HealthChecker<&'static str> for StoreChecker {
    async fn check(&self, resource: &&'static str) -> HealthStatus {
        let healthy = match *resource {
            RESOURCE_REDIS => self.cache.ping().await,
            RESOURCE_POSTGRES => self.db.ping().await,
            _ => false,
        };
        if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Builds and starts the background prober. Call once at startup; the
/// returned wrapper is cheap to clone (everything inside is `Arc`-backed)
/// and shared via `AppState`.
pub fn build_store_health(cache: ipintel_cache::IpCache, db: ipintel_db::IpDb) -> StoreHealth {
    HealthCheckWrapper::builder()
        .with_context(RESOURCE_REDIS, RESOURCE_REDIS)
        .with_context(RESOURCE_POSTGRES, RESOURCE_POSTGRES)
        .with_checker(StoreChecker { cache, db })
        .with_interval(Duration::from_secs(10))
        .with_timeout(Duration::from_secs(2))
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatuses {
    pub redis: bool,
    pub postgres: bool,
    pub providers_healthy: usize,
    pub providers_total: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: OverallStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub services: ServiceStatuses,
}

async fn service_statuses(state: &AppState) -> ServiceStatuses {
    let redis = state.store_health.get_status(RESOURCE_REDIS).await == Some(HealthStatus::Healthy);
    let postgres = state.store_health.get_status(RESOURCE_POSTGRES).await == Some(HealthStatus::Healthy);
    let registry = state.lookup.registry();
    ServiceStatuses { redis, postgres, providers_healthy: registry.healthy_count(), providers_total: registry.enabled_count() }
}

/// Spec §6 "Overall health status": `unhealthy` if Redis or Postgres down;
/// `degraded` if healthy providers < available or == 0; `healthy` otherwise.
fn overall_status(services: &ServiceStatuses) -> OverallStatus {
    if !services.redis || !services.postgres {
        OverallStatus::Unhealthy
    } else if services.providers_healthy == 0 || services.providers_healthy < services.providers_total {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    }
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let services = service_statuses(&state).await;
    let status = overall_status(&services);
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
        services,
    })
}

#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub status: &'static str,
}

pub async fn live_handler() -> Json<LiveResponse> {
    Json(LiveResponse { status: "alive" })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceStatuses>,
}

/// Spec §6 "Readiness": ready iff Redis up AND Postgres up AND at least one
/// provider healthy.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let services = service_statuses(&state).await;
    if services.redis && services.postgres && services.providers_healthy > 0 {
        (StatusCode::OK, Json(ReadyResponse { status: "ready", services: None }))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ReadyResponse { status: "not ready", services: Some(services) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_wins_over_provider_degradation() {
        let services = ServiceStatuses { redis: false, postgres: true, providers_healthy: 3, providers_total: 3 };
        assert_eq!(overall_status(&services), OverallStatus::Unhealthy);
    }

    #[test]
    fn degraded_when_some_providers_unhealthy() {
        let services = ServiceStatuses { redis: true, postgres: true, providers_healthy: 2, providers_total: 3 };
        assert_eq!(overall_status(&services), OverallStatus::Degraded);
    }

    #[test]
    fn degraded_when_zero_providers_healthy() {
        let services = ServiceStatuses { redis: true, postgres: true, providers_healthy: 0, providers_total: 3 };
        assert_eq!(overall_status(&services), OverallStatus::Degraded);
    }

    #[test]
    fn healthy_when_everything_up() {
        let services = ServiceStatuses { redis: true, postgres: true, providers_healthy: 3, providers_total: 3 };
        assert_eq!(overall_status(&services), OverallStatus::Healthy);
    }
}
