use super::common::{as_str, fetch_json};
use crate::adapter::{AdapterError, PartialResult, ProviderAdapter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `ipinfo.io` — `"loc"` is a combined `"lat,lon"` string and `"org"` is
/// typically `"ASxxxx Some Org Name"`; an optional `privacy` sub-object
/// carries vpn/proxy/tor/hosting flags when the paid plan is used.
pub struct IpInfoAdapter {
    base_url: String,
}

impl IpInfoAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

fn split_asn_org(org_field: &str) -> (Option<String>, Option<String>) {
    match org_field.split_once(' ') {
        Some((asn, rest)) if asn.starts_with("AS") => (Some(asn.to_string()), Some(rest.to_string())),
        _ => (None, Some(org_field.to_string())),
    }
}

fn split_loc(loc: &str) -> (Option<f64>, Option<f64>) {
    match loc.split_once(',') {
        Some((lat, lon)) => (lat.trim().parse().ok(), lon.trim().parse().ok()),
        None => (None, None),
    }
}

#[async_trait]
impl ProviderAdapter for IpInfoAdapter {
    fn name(&self) -> &str {
        "ipinfo"
    }

    async fn perform_lookup(
        &self,
        ip: &str,
        api_key: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PartialResult, AdapterError> {
        let url = match api_key {
            Some(key) => format!("{}/{ip}?token={key}", self.base_url),
            None => format!("{}/{ip}", self.base_url),
        };
        let body = fetch_json(&url, cancel).await?;

        if body.get("error").is_some() {
            return Err(AdapterError::Parse(
                as_str(&body, "error").unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        let (asn, org) = as_str(&body, "org").map(|o| split_asn_org(&o)).unwrap_or((None, None));
        let (latitude, longitude) = as_str(&body, "loc").map(|l| split_loc(&l)).unwrap_or((None, None));
        let privacy = body.get("privacy");

        Ok(PartialResult {
            asn,
            org,
            country: as_str(&body, "country"),
            region: as_str(&body, "region"),
            city: as_str(&body, "city"),
            latitude,
            longitude,
            timezone: as_str(&body, "timezone"),
            is_proxy: privacy.and_then(|p| p.get("proxy")).and_then(|v| v.as_bool()),
            is_vpn: privacy.and_then(|p| p.get("vpn")).and_then(|v| v.as_bool()),
            is_tor: privacy.and_then(|p| p.get("tor")).and_then(|v| v.as_bool()),
            is_hosting: privacy.and_then(|p| p.get("hosting")).and_then(|v| v.as_bool()),
            is_mobile: None,
            vpn_provider: privacy
                .and_then(|p| p.get("service"))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            abuse_score: None,
            raw: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_asn_from_org_string() {
        let (asn, org) = split_asn_org("AS15169 Google LLC");
        assert_eq!(asn.as_deref(), Some("AS15169"));
        assert_eq!(org.as_deref(), Some("Google LLC"));
    }

    #[test]
    fn splits_loc_string() {
        let (lat, lon) = split_loc("37.751,-97.822");
        assert_eq!(lat, Some(37.751));
        assert_eq!(lon, Some(-97.822));
    }
}
