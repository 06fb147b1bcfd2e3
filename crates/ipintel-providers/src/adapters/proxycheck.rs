use super::common::{as_f64, as_str, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `proxycheck.io` — specializes in proxy/VPN/Tor detection and names the
/// commercial VPN operator directly when it can (`"provider"` field), which
/// is why it's the one adapter correlation gives elevated trust for
/// `vpn_provider` resolution (spec §4.4, `ipintel_core::trust::
/// VPN_IDENTIFICATION_PROVIDER`).
pub struct ProxyCheckAdapter {
    base_url: String,
}

impl ProxyCheckAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for ProxyCheckAdapter {
    fn name(&self) -> &str {
        "proxycheck"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let url = match api_key {
            Some(key) => format!("{}/{ip}?key={key}&vpn=1&asn=1", self.base_url),
            None => format!("{}/{ip}?vpn=1&asn=1", self.base_url),
        };
        let body = fetch_json(&url, cancel).await?;

        if as_str(&body, "status").as_deref() != Some("ok") {
            return Err(AdapterError::Parse(
                as_str(&body, "message").unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }
        let entry = body.get(ip).ok_or_else(|| AdapterError::Parse("missing ip entry".to_string()))?;

        let proxy_flag = as_str(entry, "proxy").map(|v| v.eq_ignore_ascii_case("yes"));
        let kind = as_str(entry, "type").unwrap_or_default();

        Ok(PartialResult {
            asn: as_str(entry, "asn"),
            org: as_str(entry, "organisation"),
            country: as_str(entry, "isocode"),
            region: as_str(entry, "region"),
            city: as_str(entry, "city"),
            latitude: as_f64(entry, "latitude"),
            longitude: as_f64(entry, "longitude"),
            timezone: as_str(entry, "timezone"),
            is_proxy: proxy_flag,
            is_vpn: proxy_flag.map(|p| p && kind.eq_ignore_ascii_case("VPN")),
            is_tor: proxy_flag.map(|p| p && kind.eq_ignore_ascii_case("TOR")),
            is_hosting: None,
            is_mobile: None,
            vpn_provider: as_str(entry, "provider").filter(|s| !s.is_empty()),
            abuse_score: None,
            raw: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_name() {
        assert_eq!(ProxyCheckAdapter::new("https://proxycheck.io/v2").name(), "proxycheck");
    }
}
