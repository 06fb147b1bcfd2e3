use super::common::{as_bool, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// GeoIP2 Insights-shaped REST response — nested `country`/`subdivisions`/
/// `city`/`location`/`traits` objects rather than a flat record, and the
/// only adapter that reports `is_hosting_provider` directly as a trait.
pub struct MaxMindAdapter {
    base_url: String,
}

impl MaxMindAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl ProviderAdapter for MaxMindAdapter {
    fn name(&self) -> &str {
        "maxmind"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let url = match api_key {
            Some(key) => format!("{}/geoip/v2.1/insights/{ip}?key={key}", self.base_url),
            None => format!("{}/geoip/v2.1/insights/{ip}", self.base_url),
        };
        let body = fetch_json(&url, cancel).await?;

        if body.get("error").is_some() {
            return Err(AdapterError::Parse("maxmind returned an error payload".to_string()));
        }

        let country = body.get("country").and_then(|c| c.get("iso_code")).and_then(|v| v.as_str());
        let region = body
            .get("subdivisions")
            .and_then(|s| s.as_array())
            .and_then(|a| a.first())
            .and_then(|s| s.get("names"))
            .and_then(|n| n.get("en"))
            .and_then(|v| v.as_str());
        let city = body
            .get("city")
            .and_then(|c| c.get("names"))
            .and_then(|n| n.get("en"))
            .and_then(|v| v.as_str());
        let location = body.get("location");
        let latitude = location.and_then(|l| l.get("latitude")).and_then(|v| v.as_f64());
        let longitude = location.and_then(|l| l.get("longitude")).and_then(|v| v.as_f64());
        let timezone = location.and_then(|l| l.get("time_zone")).and_then(|v| v.as_str());
        let traits = body.get("traits");
        let asn = traits
            .and_then(|t| t.get("autonomous_system_number"))
            .and_then(|v| v.as_u64())
            .map(|n| format!("AS{n}"));
        let org = traits
            .and_then(|t| t.get("autonomous_system_organization"))
            .and_then(|v| v.as_str());

        Ok(PartialResult {
            asn,
            org: org.map(str::to_string),
            country: country.map(str::to_string),
            region: region.map(str::to_string),
            city: city.map(str::to_string),
            latitude,
            longitude,
            timezone: timezone.map(str::to_string),
            is_proxy: traits.and_then(|t| as_bool(t, "is_anonymous_proxy")),
            is_vpn: traits.and_then(|t| as_bool(t, "is_anonymous_vpn")),
            is_tor: traits.and_then(|t| as_bool(t, "is_tor_exit_node")),
            is_hosting: traits.and_then(|t| as_bool(t, "is_hosting_provider")),
            is_mobile: None,
            vpn_provider: None,
            abuse_score: None,
            raw: Some(body),
        })
    }
}
