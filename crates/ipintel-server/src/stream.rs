//! `GET /api/v1/lookup/stream` (spec §4.6): forwards `LookupEvent`s as
//! server-sent events and detects client disconnect through the forwarding
//! channel rather than the underlying lookup stream, so background
//! persistence always runs to completion even after the client is gone.

use crate::AppState;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use ipintel_lookup::stream::LookupEvent;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct StreamQueryParams {
    pub ip: String,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default = "default_true")]
    pub include_llm_analysis: bool,
}

fn default_true() -> bool {
    true
}

fn to_sse_event(event: &LookupEvent) -> Event {
    let value = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    let name = value.get("event").and_then(|v| v.as_str()).unwrap_or("message").to_string();
    let data = value.get("data").cloned().unwrap_or(serde_json::Value::Null);
    Event::default().event(name).json_data(data).unwrap_or_else(|_| Event::default().event("lookup_error"))
}

pub async fn lookup_stream(State(state): State<Arc<AppState>>, Query(params): Query<StreamQueryParams>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let disconnected = Arc::new(AtomicBool::new(false));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<LookupEvent>();

    let lookup = state.lookup.clone();
    let worker_disconnected = Arc::clone(&disconnected);
    tokio::spawn(async move {
        let mut events = lookup.lookup_stream(params.ip, params.force_refresh, params.include_llm_analysis, Arc::clone(&worker_disconnected));
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            if tx.send(event).is_err() {
                worker_disconnected.store(true, Ordering::Relaxed);
            }
        }
    });

    let out = tokio_stream_from_receiver(rx).map(|event| Ok(to_sse_event(&event)));
    Sse::new(out).keep_alive(KeepAlive::default())
}

fn tokio_stream_from_receiver<T>(rx: tokio::sync::mpsc::UnboundedReceiver<T>) -> impl Stream<Item = T> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}
