//! Adapter-level HTTP tests against a mock server (SPEC_FULL §9.4), rather
//! than against the real third-party endpoints: each adapter is exercised
//! through its actual `reqwest` GET, only the transport is stubbed.

use ipintel_providers::adapters::IpInfoAdapter;
use ipintel_providers::ProviderAdapter;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ipinfo_adapter_parses_a_real_http_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/8.8.8.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip": "8.8.8.8",
            "org": "AS15169 Google LLC",
            "country": "US",
            "region": "California",
            "city": "Mountain View",
            "loc": "37.4056,-122.0775",
            "timezone": "America/Los_Angeles",
        })))
        .mount(&server)
        .await;

    let adapter = IpInfoAdapter::new(server.uri());
    let result = adapter.perform_lookup("8.8.8.8", None, CancellationToken::new()).await.unwrap();

    assert_eq!(result.asn.as_deref(), Some("AS15169"));
    assert_eq!(result.org.as_deref(), Some("Google LLC"));
    assert_eq!(result.country.as_deref(), Some("US"));
    assert_eq!(result.city.as_deref(), Some("Mountain View"));
    assert_eq!(result.latitude, Some(37.4056));
    assert_eq!(result.longitude, Some(-122.0775));
}

#[tokio::test]
async fn ipinfo_adapter_surfaces_an_http_error_as_adapter_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/1.2.3.4")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let adapter = IpInfoAdapter::new(server.uri());
    let err = adapter.perform_lookup("1.2.3.4", None, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ipintel_providers::AdapterError::Http(_)));
}

#[tokio::test]
async fn ipinfo_adapter_includes_the_api_key_as_a_token_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/9.9.9.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "9.9.9.9" })))
        .mount(&server)
        .await;

    let adapter = IpInfoAdapter::new(server.uri());
    let result = adapter.perform_lookup("9.9.9.9", Some("secret-token"), CancellationToken::new()).await;
    assert!(result.is_ok());
}
