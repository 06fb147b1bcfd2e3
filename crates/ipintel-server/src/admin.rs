//! `/api/v1/providers` admin surface (SPEC_FULL §10): per-provider circuit
//! breaker state, today's daily stats, and an admin breaker reset. Neither
//! endpoint is named by spec.md's interface table in full detail — it lists
//! the health-list GET but not the reset — so the reset route is a
//! grounded addition (spec §4.2 "Admin reset returns to CLOSED, zero
//! counters").

use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ipintel_circuitbreaker::CircuitState;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<CircuitState> for BreakerState {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => BreakerState::Closed,
            CircuitState::Open => BreakerState::Open,
            CircuitState::HalfOpen => BreakerState::HalfOpen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub trust_rank: u8,
    pub is_healthy: bool,
    pub breaker_state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Milliseconds until the breaker next allows a probe call, if it is
    /// currently OPEN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_in_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_stats: Option<ipintel_core::model::ProviderDailyStats>,
}

pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderStatus>> {
    let today = chrono::Utc::now().date_naive();
    let mut out = Vec::new();
    for provider in state.lookup.registry().providers() {
        let metrics = provider.breaker_metrics();
        let next_retry_in_ms = metrics.next_retry_at.map(|at| at.saturating_duration_since(std::time::Instant::now()).as_millis() as u64);
        let daily_stats = state.db.daily_stats(provider.name(), today).await.ok().flatten();
        out.push(ProviderStatus {
            name: provider.name().to_string(),
            enabled: provider.config.enabled,
            trust_rank: provider.config.trust_rank,
            is_healthy: provider.is_healthy(),
            breaker_state: metrics.state.into(),
            failure_count: metrics.failure_count,
            success_count: metrics.success_count,
            next_retry_in_ms,
            daily_stats,
        });
    }
    Json(out)
}

pub async fn reset_provider(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> StatusCode {
    match state.lookup.registry().find(&name) {
        Some(provider) => {
            provider.reset_breaker();
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}
