use super::common::{as_bool, as_f64, as_str, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `ip-api.com` — flat JSON with `proxy`/`hosting`/`mobile` booleans under
/// its `fields=` query extension.
pub struct IpApiAdapter {
    base_url: String,
}

impl IpApiAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for IpApiAdapter {
    fn name(&self) -> &str {
        "ipapi"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        _api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let url = format!(
            "{}/json/{ip}?fields=status,message,country,countryCode,region,regionName,city,lat,lon,timezone,isp,org,as,mobile,proxy,hosting",
            self.base_url
        );
        let body = fetch_json(&url, cancel).await?;

        if as_str(&body, "status").as_deref() == Some("fail") {
            return Err(AdapterError::Parse(
                as_str(&body, "message").unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        Ok(PartialResult {
            asn: as_str(&body, "as"),
            org: as_str(&body, "org").or_else(|| as_str(&body, "isp")),
            country: as_str(&body, "countryCode"),
            region: as_str(&body, "regionName"),
            city: as_str(&body, "city"),
            latitude: as_f64(&body, "lat"),
            longitude: as_f64(&body, "lon"),
            timezone: as_str(&body, "timezone"),
            is_proxy: as_bool(&body, "proxy"),
            is_vpn: None,
            is_tor: None,
            is_hosting: as_bool(&body, "hosting"),
            is_mobile: as_bool(&body, "mobile"),
            vpn_provider: None,
            abuse_score: None,
            raw: Some(body),
        })
    }
}
