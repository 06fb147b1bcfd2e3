//! LLM enrichment as an external-collaborator boundary (spec §4.7).
//!
//! `analyze` must complete within `LLM_TIMEOUT_MS` and must never throw to
//! the caller — any failure, including a timeout, returns `None`. Wrapped
//! in `ipintel-timelimiter` the same way `ipintel-providers::shell` wraps
//! each adapter, so the timeout composition stays consistent across the
//! codebase rather than hand-rolling a second `tokio::time::timeout` path.

use async_trait::async_trait;
use ipintel_core::model::{CorrelatedIpRecord, LlmAnalysis, LlmSeverity, LlmVerdict};
use ipintel_timelimiter::{TimeLimiterError, TimeLimiterLayer};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Implemented by whatever actually produces the analysis — a local
/// rule-based heuristic, an on-box model, or a remote API (spec §4.7
/// "Implementation is free"). Unlike [`LlmEnricher`], this may fail.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, record: &CorrelatedIpRecord) -> Result<LlmAnalysis, LlmError>;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LlmHealth {
    pub available: bool,
    pub model: String,
    pub latency_ms: u64,
}

#[derive(Clone)]
struct BackendService {
    backend: std::sync::Arc<dyn LlmBackend>,
}

impl Service<CorrelatedIpRecord> for BackendService {
    type Response = LlmAnalysis;
    type Error = LlmError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, record: CorrelatedIpRecord) -> Self::Future {
        let backend = std::sync::Arc::clone(&self.backend);
        Box::pin(async move { backend.generate(&record).await })
    }
}

/// The boundary the rest of the system talks to (spec §4.7 contract:
/// `analyze(record) -> LLMAnalysis | null`, never throws).
pub struct LlmEnricher {
    stack: ipintel_timelimiter::TimeLimiter<BackendService, CorrelatedIpRecord>,
    model: String,
}

impl LlmEnricher {
    pub fn new(backend: std::sync::Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        let model = backend.model_name().to_string();
        let svc = BackendService { backend };
        let layer = TimeLimiterLayer::<CorrelatedIpRecord>::builder().timeout_duration(timeout).cancel_running_future(true).build();
        Self { stack: layer.layer(svc), model }
    }

    /// Never throws: a backend error or a timeout both collapse to `None`
    /// (spec §4.7, §7 "LLM errors — logged, swallowed; enrichment is
    /// omitted").
    pub async fn analyze(&self, record: &CorrelatedIpRecord) -> Option<LlmAnalysis> {
        let mut stack = self.stack.clone();
        let result = match stack.ready().await {
            Ok(svc) => svc.call(record.clone()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(analysis) => Some(analysis),
            Err(TimeLimiterError::Timeout) => {
                warn!(ip = %record.ip, "LLM enrichment timed out");
                None
            }
            Err(TimeLimiterError::Inner(e)) => {
                warn!(ip = %record.ip, error = %e, "LLM enrichment failed");
                None
            }
        }
    }

    pub async fn health(&self) -> LlmHealth {
        let probe = CorrelatedIpRecord {
            ip: "0.0.0.0".to_string(),
            asn: None,
            org: None,
            location: Default::default(),
            flags: Default::default(),
            threat: Default::default(),
            metadata: ipintel_core::model::Metadata {
                providers: vec![],
                conflicts: None,
                source: ipintel_core::model::RecordSource::Live,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                expires_at: chrono::Utc::now(),
                ttl_seconds: 0,
                warnings: None,
                partial_data: false,
                providers_queried: 0,
                providers_succeeded: 0,
                llm_analysis: None,
            },
        };
        let started = Instant::now();
        let available = self.analyze(&probe).await.is_some();
        LlmHealth { available, model: self.model.clone(), latency_ms: started.elapsed().as_millis() as u64 }
    }
}

/// A local, deterministic heuristic backend: no external model call, just
/// rules over the fused record's own risk signals. Ships as the default so
/// the system is fully runnable without a remote LLM dependency (spec §4.7
/// "Implementation is free (rule-based, local model, remote API)").
pub struct RuleBasedBackend;

#[async_trait]
impl LlmBackend for RuleBasedBackend {
    fn model_name(&self) -> &str {
        "rule-based-v1"
    }

    async fn generate(&self, record: &CorrelatedIpRecord) -> Result<LlmAnalysis, LlmError> {
        let abuse_score = record.threat.abuse_score.unwrap_or(0);
        let mut indicators = Vec::new();
        if record.flags.is_tor == Some(true) {
            indicators.push("Tor exit node".to_string());
        }
        if record.flags.is_vpn == Some(true) {
            indicators.push(format!("VPN egress{}", record.flags.vpn_provider.as_ref().map(|p| format!(" ({p})")).unwrap_or_default()));
        }
        if record.flags.is_proxy == Some(true) {
            indicators.push("Open or anonymizing proxy".to_string());
        }
        if record.flags.is_hosting == Some(true) {
            indicators.push("Datacenter/hosting ASN".to_string());
        }
        if abuse_score >= 50 {
            indicators.push(format!("Elevated abuse score ({abuse_score})"));
        }

        let (verdict, severity) = match (record.threat.risk_level, abuse_score) {
            (Some(ipintel_core::model::RiskLevel::High), _) | (_, 70..=100) => (LlmVerdict::Block, LlmSeverity::Critical),
            (Some(ipintel_core::model::RiskLevel::Medium), _) | (_, 30..=69) => (LlmVerdict::Investigate, LlmSeverity::High),
            (Some(ipintel_core::model::RiskLevel::Low), _) => (LlmVerdict::Monitor, LlmSeverity::Medium),
            _ => (LlmVerdict::Allow, LlmSeverity::Safe),
        };

        let summary = if indicators.is_empty() {
            format!("No notable risk signals for {}.", record.ip)
        } else {
            format!("{} flagged: {}.", record.ip, indicators.join(", "))
        };

        debug!(ip = %record.ip, verdict = ?verdict, "rule-based LLM analysis produced");

        Ok(LlmAnalysis {
            summary: summary.clone(),
            risk_assessment: format!("{:?} risk, abuse score {abuse_score}", record.threat.risk_level.unwrap_or(ipintel_core::model::RiskLevel::Low)),
            recommendations: recommendations_for(verdict),
            threat_indicators: indicators,
            confidence: record.flags.confidence,
            verdict,
            severity_level: severity,
            executive_summary: summary,
            technical_details: format!(
                "asn={:?} org={:?} country={:?} providers_succeeded={}/{}",
                record.asn, record.org, record.location.country, record.metadata.providers_succeeded, record.metadata.providers_queried
            ),
        })
    }
}

fn recommendations_for(verdict: LlmVerdict) -> Vec<String> {
    match verdict {
        LlmVerdict::Block => vec!["Block traffic from this address".to_string(), "Review recent requests from this IP".to_string()],
        LlmVerdict::Investigate => vec!["Flag for manual review".to_string()],
        LlmVerdict::Monitor => vec!["No immediate action; continue monitoring".to_string()],
        LlmVerdict::Allow => vec![],
    }
}
