use super::common::{as_bool, as_f64, as_str, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `ipwhois.app` — ASN/org/geolocation plus a `security` sub-object with
/// proxy/vpn/tor flags.
pub struct IpWhoisAdapter {
    base_url: String,
}

impl IpWhoisAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for IpWhoisAdapter {
    fn name(&self) -> &str {
        "ipwhois"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        _api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let url = format!("{}/{ip}", self.base_url);
        let body = fetch_json(&url, cancel).await?;

        if body.get("success").and_then(|v| v.as_bool()) == Some(false) {
            return Err(AdapterError::Parse(
                as_str(&body, "message").unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        let security = body.get("security");
        Ok(PartialResult {
            asn: as_str(&body, "asn"),
            org: as_str(&body, "org").or_else(|| as_str(&body, "isp")),
            country: as_str(&body, "country_code"),
            region: as_str(&body, "region"),
            city: as_str(&body, "city"),
            latitude: as_f64(&body, "latitude"),
            longitude: as_f64(&body, "longitude"),
            timezone: body.get("timezone").and_then(|t| as_str(t, "id")),
            is_proxy: security.and_then(|s| as_bool(s, "proxy")),
            is_vpn: security.and_then(|s| as_bool(s, "vpn")),
            is_tor: security.and_then(|s| as_bool(s, "tor")),
            is_hosting: security.and_then(|s| as_bool(s, "hosting")),
            is_mobile: None,
            vpn_provider: None,
            abuse_score: None,
            raw: Some(body),
        })
    }
}
