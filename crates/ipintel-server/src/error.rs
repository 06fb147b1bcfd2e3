//! Maps `LookupError` (spec §7 taxonomy) onto an HTTP status + JSON body,
//! attaching `timestamp` and `requestId` to every error response (spec §6:
//! "all responses include `timestamp` and `requestId` for errors").

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use ipintel_core::{ErrorCode, LookupError};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
}

/// Thin wrapper so `LookupError` (which every crate below `ipintel-server`
/// returns) can be turned into a `Response` without making those crates
/// depend on `axum`.
pub struct ApiError(pub LookupError);

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        Self(err)
    }
}

/// Extracts the `retry_after` seconds baked into a `RATE_LIMIT_EXCEEDED`
/// message by `LookupError::rate_limit_exceeded` (spec §6 "429 ...
/// `Retry-After` header").
fn retry_after_secs(message: &str) -> Option<u64> {
    message.strip_prefix("rate limit exceeded, retry after ")?.strip_suffix('s')?.parse().ok()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: err.code,
            message: err.message.clone(),
            suggestion: err.suggestion.clone(),
            details: err.details.clone(),
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
        };

        let mut response = (status, Json(body)).into_response();
        if err.code == ErrorCode::RateLimitExceeded {
            if let Some(secs) = retry_after_secs(&err.message) {
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert(HeaderName::from_static("retry-after"), value);
                }
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_retry_after_out_of_the_rate_limit_message() {
        let err = LookupError::rate_limit_exceeded(42);
        assert_eq!(retry_after_secs(&err.message), Some(42));
    }

    #[test]
    fn non_rate_limit_messages_parse_to_none() {
        assert_eq!(retry_after_secs("All providers failed or timed out"), None);
    }
}
