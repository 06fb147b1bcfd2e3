//! Provider registry: owns every configured provider in a fixed,
//! registration-defined order (spec §4.3: results must come back "in the
//! original provider registration order").

use crate::adapters;
use crate::shell::Provider;
use ipintel_core::model::ProviderConfig;
use ipintel_core::trust::TrustTable;
use std::time::Duration;

/// All configured providers, in the order they were registered. This
/// order is the contract the Provider Manager and correlation warnings
/// rely on.
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// Builds the registry's default, shipped adapter set from
    /// per-provider env-derived configs, in a fixed order (spec §4.4
    /// "Trust rank table" lists the providers this aggregator ships
    /// adapters for).
    pub fn from_settings(
        api_keys: &std::collections::HashMap<String, String>,
        trust: &TrustTable,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_attempts: u32,
        provider_timeout_ms: u64,
        provider_retries: usize,
        provider_retry_delay_ms: u64,
    ) -> Self {
        let names = adapters::SHIPPED_ADAPTER_NAMES;
        let providers = names
            .iter()
            .map(|&name| {
                let config = ProviderConfig {
                    name: name.to_string(),
                    enabled: std::env::var(format!("{}_ENABLED", name.to_uppercase()))
                        .map(|v| v != "false")
                        .unwrap_or(true),
                    base_url: adapters::default_base_url(name).to_string(),
                    api_key: api_keys.get(name).cloned(),
                    timeout_ms: provider_timeout_ms,
                    retries: provider_retries,
                    retry_delay_ms: provider_retry_delay_ms,
                    trust_rank: trust.rank_of(name),
                };
                let adapter = adapters::build_adapter(name);
                Provider::with_breaker_settings(
                    config,
                    adapter,
                    failure_threshold,
                    reset_timeout,
                    half_open_attempts,
                )
            })
            .collect();
        Self::new(providers)
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn enabled_count(&self) -> usize {
        self.providers.iter().filter(|p| p.config.enabled).count()
    }

    pub fn healthy_count(&self) -> usize {
        self.providers.iter().filter(|p| p.config.enabled && p.is_healthy()).count()
    }

    pub fn find(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name() == name)
    }
}
