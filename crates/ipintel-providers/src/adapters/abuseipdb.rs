use super::common::{as_str, as_u8, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `abuseipdb.com` — abuse-confidence scoring, no geolocation data of its
/// own beyond country code.
pub struct AbuseIpDbAdapter {
    base_url: String,
}

impl AbuseIpDbAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for AbuseIpDbAdapter {
    fn name(&self) -> &str {
        "abuseipdb"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let key = api_key.ok_or_else(|| AdapterError::Http("missing API key".to_string()))?;
        let url = format!("{}/check?ipAddress={ip}&maxAgeInDays=90&key={key}", self.base_url);
        let body = fetch_json(&url, cancel).await?;
        let data = body.get("data").ok_or_else(|| AdapterError::Parse("missing data".to_string()))?;

        Ok(PartialResult {
            asn: None,
            org: as_str(data, "isp"),
            country: as_str(data, "countryCode"),
            region: None,
            city: None,
            latitude: None,
            longitude: None,
            timezone: None,
            is_proxy: as_u8(data, "abuseConfidenceScore").map(|s| s > 0),
            is_vpn: None,
            is_tor: data.get("isTor").and_then(|v| v.as_bool()),
            is_hosting: None,
            is_mobile: None,
            vpn_provider: None,
            abuse_score: as_u8(data, "abuseConfidenceScore"),
            raw: Some(body.clone()),
        })
    }
}
