//! `/api/v1/lookup`, `/api/v1/lookup/bulk`, `/api/v1/lookup/cidr` (spec §6).
//! The streaming variant lives in `crate::stream`.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use ipintel_core::model::{BulkLookupResponse, CidrLookupResponse, CorrelatedIpRecord, ResolvedFrom};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Resolves the requester's IP for the per-requester bulk/CIDR rate limit
/// (spec §4.5 "Per-requester rate limit"): prefers `X-Forwarded-For`'s
/// first hop (this service usually sits behind a proxy), falls back to the
/// TCP peer address.
pub fn requester_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Deserialize)]
pub struct LookupRequestBody {
    pub ip: String,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default = "default_true")]
    pub include_llm_analysis: bool,
}

#[derive(Debug, Deserialize)]
pub struct LookupQueryParams {
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default = "default_true")]
    pub include_llm_analysis: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct LookupResponseBody {
    #[serde(flatten)]
    pub record: CorrelatedIpRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_from: Option<ResolvedFrom>,
}

pub async fn lookup_post(State(state): State<Arc<AppState>>, Json(body): Json<LookupRequestBody>) -> Result<Json<LookupResponseBody>, ApiError> {
    let (record, resolved_from) = state.lookup.lookup(&body.ip, body.force_refresh, body.include_llm_analysis).await?;
    Ok(Json(LookupResponseBody { record, resolved_from }))
}

pub async fn lookup_get(State(state): State<Arc<AppState>>, Path(ip): Path<String>, Query(params): Query<LookupQueryParams>) -> Result<Json<LookupResponseBody>, ApiError> {
    let (record, resolved_from) = state.lookup.lookup(&ip, params.force_refresh, params.include_llm_analysis).await?;
    Ok(Json(LookupResponseBody { record, resolved_from }))
}

#[derive(Debug, Deserialize)]
pub struct BulkRequestBody {
    pub ips: Vec<String>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub include_llm_analysis: bool,
}

pub async fn lookup_bulk(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<BulkRequestBody>,
) -> Result<Json<BulkLookupResponse>, ApiError> {
    let requester = requester_ip(&headers, Some(peer));
    let response = state.lookup.bulk_lookup(body.ips, body.force_refresh, body.include_llm_analysis, &requester).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CidrRequestBody {
    pub cidr: String,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub include_llm_analysis: bool,
}

pub async fn lookup_cidr(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CidrRequestBody>,
) -> Result<Json<CidrLookupResponse>, ApiError> {
    let requester = requester_ip(&headers, Some(peer));
    let response = state.lookup.cidr_lookup(&body.cidr, body.force_refresh, body.include_llm_analysis, &requester).await?;
    Ok(Json(response))
}
