//! Trust-rank table (spec §4.4, §9 design note).
//!
//! Built once at startup from environment overrides; every subsequent read
//! is a plain map lookup so correlation never touches the environment
//! per-call (spec §9: "Per-call reads must not touch the environment").

use std::collections::HashMap;

/// Built-in defaults (6-9) for the providers this aggregator ships
/// adapters for (spec §3: "Trust rank defaults to 5 if not configured").
/// Any provider not listed here, and not overridden, gets the default 5.
fn builtin_defaults() -> HashMap<&'static str, u8> {
    HashMap::from([
        ("ipwhois", 6),
        ("ipapi", 6),
        ("ipinfo", 7),
        ("ip2location", 6),
        ("dbip", 6),
        ("maxmind", 8),
        ("abuseipdb", 8),
        ("virustotal", 8),
        ("shodan", 7),
        ("proxycheck", 9),
        ("ipqualityscore", 9),
        ("spamhaus", 8),
    ])
}

/// `proxycheck` is configured with elevated trust (10) for VPN-provider
/// identification specifically (spec §4.4 "one adapter may be configured
/// to have elevated trust (10) for VPN identification"). This is distinct
/// from its general trust rank above, used only by `ipintel-correlation`'s
/// `vpn_provider` fusion.
pub const VPN_IDENTIFICATION_PROVIDER: &str = "proxycheck";
pub const VPN_IDENTIFICATION_TRUST_RANK: u8 = 10;

/// Immutable, process-wide trust-rank table.
#[derive(Debug, Clone)]
pub struct TrustTable {
    ranks: HashMap<String, u8>,
}

impl TrustTable {
    /// Build from built-in defaults overlaid with `{PROVIDER}_TRUST_RANK`
    /// environment overrides. Call once at startup; the result is meant to
    /// be wrapped in `Arc` and shared.
    pub fn from_env(provider_names: &[String]) -> Self {
        let mut ranks: HashMap<String, u8> = builtin_defaults()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        for name in provider_names {
            ranks.entry(name.clone()).or_insert(crate::model::ProviderConfig::DEFAULT_TRUST_RANK);
            let env_key = format!("{}_TRUST_RANK", name.to_uppercase());
            if let Ok(raw) = std::env::var(&env_key) {
                if let Ok(parsed) = raw.parse::<u8>() {
                    ranks.insert(name.clone(), parsed.min(10));
                }
            }
        }
        Self { ranks }
    }

    /// Builds a table directly from a pre-computed map, bypassing
    /// environment overrides. For tests in this crate and downstream
    /// crates (`ipintel-correlation`'s fusion tests in particular).
    pub fn from_map(ranks: HashMap<String, u8>) -> Self {
        Self { ranks }
    }

    pub fn rank_of(&self, provider: &str) -> u8 {
        self.ranks.get(provider).copied().unwrap_or(crate::model::ProviderConfig::DEFAULT_TRUST_RANK)
    }
}
