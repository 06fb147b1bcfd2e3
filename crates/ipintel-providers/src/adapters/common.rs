//! Shared HTTP plumbing for adapters. Mechanical: build a URL, issue a GET,
//! parse JSON, map onto `PartialResult`. Individual provider response
//! shapes are the out-of-scope "pluggable adapter" detail (spec §1); this
//! helper is the only piece every adapter reuses.

use crate::adapter::AdapterError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One process-wide HTTP client shared by every adapter, matching the
/// spec's resource-pool guidance (spec §5 "Connection pools ... are
/// process-wide and thread-safe").
pub fn shared_client() -> reqwest::Client {
    static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .pool_max_idle_per_host(32)
                .connect_timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builder should not fail with these settings")
        })
        .clone()
}

/// Issues a GET request and parses the body as JSON, racing the supplied
/// cancellation token so the shell's composed deadline can abort in-flight
/// I/O (spec §4.1 "Timeout composition").
pub async fn fetch_json(url: &str, cancel: CancellationToken) -> Result<serde_json::Value, AdapterError> {
    let client = shared_client();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AdapterError::Cancelled),
        result = client.get(url).send() => {
            let response = result.map_err(|e| AdapterError::Http(e.to_string()))?;
            if !response.status().is_success() {
                return Err(AdapterError::Http(format!("HTTP {}", response.status())));
            }
            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| AdapterError::Parse(e.to_string()))
        }
    }
}

pub fn as_str(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

pub fn as_f64(v: &serde_json::Value, key: &str) -> Option<f64> {
    v.get(key).and_then(|x| x.as_f64())
}

pub fn as_bool(v: &serde_json::Value, key: &str) -> Option<bool> {
    v.get(key).and_then(|x| x.as_bool())
}

pub fn as_u8(v: &serde_json::Value, key: &str) -> Option<u8> {
    v.get(key).and_then(|x| x.as_u64()).map(|n| n.min(100) as u8)
}
