//! Binary entry point: loads configuration, wires every crate together,
//! and serves the HTTP surface (spec §6).

use anyhow::Context;
use clap::Parser;
use ipintel_core::config::Settings;
use ipintel_core::trust::TrustTable;
use ipintel_llm::{LlmEnricher, RuleBasedBackend};
use ipintel_lookup::LookupService;
use ipintel_manager::ProviderManager;
use ipintel_providers::ProviderRegistry;
use ipintel_server::AppState;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `{PROVIDER}_API_KEY` for every shipped adapter (SPEC_FULL §9.3's
/// per-provider env convention).
fn collect_api_keys() -> HashMap<String, String> {
    ipintel_providers::adapters::SHIPPED_ADAPTER_NAMES
        .iter()
        .filter_map(|&name| {
            let key = std::env::var(format!("{}_API_KEY", name.to_uppercase())).ok()?;
            Some((name.to_string(), key))
        })
        .collect()
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ipintel=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();
    init_tracing(&settings.log_format);

    let provider_names: Vec<String> = ipintel_providers::adapters::SHIPPED_ADAPTER_NAMES.iter().map(|s| s.to_string()).collect();
    let trust = Arc::new(TrustTable::from_env(&provider_names));
    let api_keys = collect_api_keys();

    let registry = ProviderRegistry::from_settings(
        &api_keys,
        trust.as_ref(),
        settings.circuit_breaker_failure_threshold,
        Duration::from_millis(settings.circuit_breaker_reset_timeout_ms),
        settings.circuit_breaker_half_open_attempts,
        settings.provider_timeout_ms,
        settings.provider_retries,
        settings.provider_retry_delay_ms,
    );
    tracing::info!(enabled = registry.enabled_count(), "provider registry ready");

    let manager = ProviderManager::new(settings.provider_concurrency);

    let cache = ipintel_cache::IpCache::connect(&settings.redis_url).await.context("connecting to redis")?;
    let db = ipintel_db::IpDb::connect(&settings.database_url).await.context("connecting to postgres")?;

    let llm: Arc<LlmEnricher> = Arc::new(LlmEnricher::new(Arc::new(RuleBasedBackend), Duration::from_millis(settings.llm_timeout_ms)));

    let settings = Arc::new(settings);
    let lookup = LookupService::new(registry, manager, Arc::clone(&trust), cache.clone(), db.clone(), Arc::clone(&llm), Arc::clone(&settings));

    let store_health = ipintel_server::build_store_health(cache.clone(), db.clone());
    store_health.start().await;

    let bind_addr = settings.http_bind_addr.clone();
    let state = Arc::new(AppState::new(lookup, cache, db, llm, store_health, settings));
    ipintel_server::spawn_background_tasks(Arc::clone(&state));

    let app = ipintel_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "ipintel listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
