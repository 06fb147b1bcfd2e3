use super::common::{as_bool, as_f64, as_str, as_u8, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `ipqualityscore.com` — fraud-scoring provider; `fraud_score` doubles as
/// our `abuse_score` and `active_vpn`/`proxy`/`tor` flags are direct.
pub struct IpQualityScoreAdapter {
    base_url: String,
}

impl IpQualityScoreAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for IpQualityScoreAdapter {
    fn name(&self) -> &str {
        "ipqualityscore"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let key = api_key.ok_or_else(|| AdapterError::Http("missing API key".to_string()))?;
        let url = format!("{}/json/{key}/{ip}", self.base_url);
        let body = fetch_json(&url, cancel).await?;

        if as_bool(&body, "success") == Some(false) {
            return Err(AdapterError::Parse(
                as_str(&body, "message").unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        Ok(PartialResult {
            asn: body.get("ASN").map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())),
            org: as_str(&body, "organization").or_else(|| as_str(&body, "ISP")),
            country: as_str(&body, "country_code"),
            region: as_str(&body, "region"),
            city: as_str(&body, "city"),
            latitude: as_f64(&body, "latitude"),
            longitude: as_f64(&body, "longitude"),
            timezone: as_str(&body, "timezone"),
            is_proxy: as_bool(&body, "proxy"),
            is_vpn: as_bool(&body, "vpn").or_else(|| as_bool(&body, "active_vpn")),
            is_tor: as_bool(&body, "tor"),
            is_hosting: as_bool(&body, "host"),
            is_mobile: as_bool(&body, "mobile"),
            vpn_provider: None,
            abuse_score: as_u8(&body, "fraud_score"),
            raw: Some(body),
        })
    }
}
