//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the call contract the pipeline uses to emit metrics ([`MetricsSink`])
//! - Emit through the `metrics` facade to a Prometheus exporter
//! - Keep an in-memory record for replays and tests
//!
//! # Metrics
//! - `filter_request_errors_total` (counter): by model, reason
//! - `filter_model_ttft_seconds` (histogram): first-token latency by model
//! - `filter_model_{prompt,completion}_tokens_total` (counter): plain family
//! - `filter_model_completion_latency_seconds`, `filter_model_tpot_seconds` (histogram)
//! - `filter_model_cost_total` (gauge, monotonic): by model, currency
//! - `filter_identity_tokens_total` (counter): user, tier, model, type
//! - `filter_identity_requests_total` (counter): user, tier, model, decision
//! - `filter_identity_reasoning_requests_total` (counter): user, tier, model
//! - `filter_identity_cache_requests_total` (counter): user, tier, model, result
//! - `filter_identity_untrusted_headers_total` (counter): header, reason
//!
//! # Design Decisions
//! - Label values reaching this module are already sanitized
//! - The plain token family and the identity token family are never both
//!   emitted for one request; that is enforced by the caller

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

use crate::pipeline::context::Identity;

/// Reason attached to a request-error metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    ParseError,
    InvalidTokenCount,
    ZeroTokenCount,
    ExcessiveTokenCount,
    #[serde(rename = "upstream_4xx")]
    Upstream4xx,
    #[serde(rename = "upstream_5xx")]
    Upstream5xx,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::InvalidTokenCount => "invalid_token_count",
            Self::ZeroTokenCount => "zero_token_count",
            Self::ExcessiveTokenCount => "excessive_token_count",
            Self::Upstream4xx => "upstream_4xx",
            Self::Upstream5xx => "upstream_5xx",
        }
    }
}

/// Value of the `type` label on identity token counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Prompt,
    Completion,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Completion => "completion",
        }
    }
}

/// Call contract between the pipeline and the metrics registry.
///
/// Implementations are shared by every request and must be thread-safe.
pub trait MetricsSink: Send + Sync {
    fn request_error(&self, model: &str, reason: ErrorReason);
    fn model_ttft(&self, model: &str, seconds: f64);
    fn model_tokens(&self, model: &str, prompt: u64, completion: u64);
    fn model_completion_latency(&self, model: &str, seconds: f64);
    fn model_tpot(&self, model: &str, seconds: f64);
    fn model_cost(&self, model: &str, currency: &str, amount: f64);
    fn identity_tokens(&self, identity: &Identity, model: &str, kind: TokenKind, count: u64);
    fn identity_request(&self, identity: &Identity, model: &str, decision: &str);
    fn identity_reasoning_request(&self, identity: &Identity, model: &str);
    fn identity_cache_request(&self, identity: &Identity, model: &str, hit: bool);
    fn untrusted_identity_header(&self, header: &'static str, reason: &'static str);
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!("filter_request_errors_total", "Request errors by model and reason");
    describe_histogram!("filter_model_ttft_seconds", "Time to first token");
    describe_counter!("filter_model_prompt_tokens_total", "Prompt tokens by model");
    describe_counter!("filter_model_completion_tokens_total", "Completion tokens by model");
    describe_histogram!("filter_model_completion_latency_seconds", "End-to-end completion latency");
    describe_histogram!("filter_model_tpot_seconds", "Time per output token");
    describe_gauge!("filter_model_cost_total", "Accumulated request cost");
    describe_counter!("filter_identity_tokens_total", "Tokens by user, tier, model and type");
    describe_counter!("filter_identity_requests_total", "Requests by user, tier, model and decision");
    describe_counter!("filter_identity_reasoning_requests_total", "Reasoning requests by user");
    describe_counter!("filter_identity_cache_requests_total", "Cache lookups by user");
    describe_counter!("filter_identity_untrusted_headers_total", "Rejected identity headers");
}

/// Emits through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn request_error(&self, model: &str, reason: ErrorReason) {
        counter!("filter_request_errors_total",
            "model" => model.to_string(), "reason" => reason.as_str()
        )
        .increment(1);
    }

    fn model_ttft(&self, model: &str, seconds: f64) {
        histogram!("filter_model_ttft_seconds", "model" => model.to_string()).record(seconds);
    }

    fn model_tokens(&self, model: &str, prompt: u64, completion: u64) {
        let m = model.to_string();
        counter!("filter_model_prompt_tokens_total", "model" => m.clone()).increment(prompt);
        counter!("filter_model_completion_tokens_total", "model" => m).increment(completion);
    }

    fn model_completion_latency(&self, model: &str, seconds: f64) {
        histogram!("filter_model_completion_latency_seconds", "model" => model.to_string())
            .record(seconds);
    }

    fn model_tpot(&self, model: &str, seconds: f64) {
        histogram!("filter_model_tpot_seconds", "model" => model.to_string()).record(seconds);
    }

    fn model_cost(&self, model: &str, currency: &str, amount: f64) {
        // Counters are integral; a gauge carries the fractional running total.
        gauge!("filter_model_cost_total",
            "model" => model.to_string(), "currency" => currency.to_string()
        )
        .increment(amount);
    }

    fn identity_tokens(&self, identity: &Identity, model: &str, kind: TokenKind, count: u64) {
        counter!("filter_identity_tokens_total",
            "user" => identity.user().to_string(),
            "tier" => identity.tier().to_string(),
            "model" => model.to_string(),
            "type" => kind.as_str()
        )
        .increment(count);
    }

    fn identity_request(&self, identity: &Identity, model: &str, decision: &str) {
        counter!("filter_identity_requests_total",
            "user" => identity.user().to_string(),
            "tier" => identity.tier().to_string(),
            "model" => model.to_string(),
            "decision" => decision.to_string()
        )
        .increment(1);
    }

    fn identity_reasoning_request(&self, identity: &Identity, model: &str) {
        counter!("filter_identity_reasoning_requests_total",
            "user" => identity.user().to_string(),
            "tier" => identity.tier().to_string(),
            "model" => model.to_string()
        )
        .increment(1);
    }

    fn identity_cache_request(&self, identity: &Identity, model: &str, hit: bool) {
        counter!("filter_identity_cache_requests_total",
            "user" => identity.user().to_string(),
            "tier" => identity.tier().to_string(),
            "model" => model.to_string(),
            "result" => if hit { "hit" } else { "miss" }
        )
        .increment(1);
    }

    fn untrusted_identity_header(&self, header: &'static str, reason: &'static str) {
        counter!("filter_identity_untrusted_headers_total",
            "header" => header, "reason" => reason
        )
        .increment(1);
    }
}

/// One recorded metric emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricEvent {
    RequestError { model: String, reason: ErrorReason },
    ModelTtft { model: String, seconds: f64 },
    ModelTokens { model: String, prompt: u64, completion: u64 },
    ModelCompletionLatency { model: String, seconds: f64 },
    ModelTpot { model: String, seconds: f64 },
    ModelCost { model: String, currency: String, amount: f64 },
    IdentityTokens { user: String, tier: String, model: String, kind: TokenKind, count: u64 },
    IdentityRequest { user: String, tier: String, model: String, decision: String },
    IdentityReasoningRequest { user: String, tier: String, model: String },
    IdentityCacheRequest { user: String, tier: String, model: String, hit: bool },
    UntrustedIdentityHeader { header: String, reason: String },
}

impl MetricEvent {
    /// True for emissions that carry user/tier labels.
    pub fn is_identity_scoped(&self) -> bool {
        matches!(
            self,
            Self::IdentityTokens { .. }
                | Self::IdentityRequest { .. }
                | Self::IdentityReasoningRequest { .. }
                | Self::IdentityCacheRequest { .. }
        )
    }
}

/// Records every emission in memory.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<MetricEvent> {
        self.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<MetricEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn count(&self, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
        self.lock().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: MetricEvent) {
        self.lock().push(event);
    }

    /// A panic while holding the lock leaves a valid `Vec`; keep recording.
    fn lock(&self) -> MutexGuard<'_, Vec<MetricEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsSink for MemoryMetrics {
    fn request_error(&self, model: &str, reason: ErrorReason) {
        self.push(MetricEvent::RequestError { model: model.into(), reason });
    }

    fn model_ttft(&self, model: &str, seconds: f64) {
        self.push(MetricEvent::ModelTtft { model: model.into(), seconds });
    }

    fn model_tokens(&self, model: &str, prompt: u64, completion: u64) {
        self.push(MetricEvent::ModelTokens { model: model.into(), prompt, completion });
    }

    fn model_completion_latency(&self, model: &str, seconds: f64) {
        self.push(MetricEvent::ModelCompletionLatency { model: model.into(), seconds });
    }

    fn model_tpot(&self, model: &str, seconds: f64) {
        self.push(MetricEvent::ModelTpot { model: model.into(), seconds });
    }

    fn model_cost(&self, model: &str, currency: &str, amount: f64) {
        self.push(MetricEvent::ModelCost {
            model: model.into(),
            currency: currency.into(),
            amount,
        });
    }

    fn identity_tokens(&self, identity: &Identity, model: &str, kind: TokenKind, count: u64) {
        self.push(MetricEvent::IdentityTokens {
            user: identity.user().into(),
            tier: identity.tier().into(),
            model: model.into(),
            kind,
            count,
        });
    }

    fn identity_request(&self, identity: &Identity, model: &str, decision: &str) {
        self.push(MetricEvent::IdentityRequest {
            user: identity.user().into(),
            tier: identity.tier().into(),
            model: model.into(),
            decision: decision.into(),
        });
    }

    fn identity_reasoning_request(&self, identity: &Identity, model: &str) {
        self.push(MetricEvent::IdentityReasoningRequest {
            user: identity.user().into(),
            tier: identity.tier().into(),
            model: model.into(),
        });
    }

    fn identity_cache_request(&self, identity: &Identity, model: &str, hit: bool) {
        self.push(MetricEvent::IdentityCacheRequest {
            user: identity.user().into(),
            tier: identity.tier().into(),
            model: model.into(),
            hit,
        });
    }

    fn untrusted_identity_header(&self, header: &'static str, reason: &'static str) {
        self.push(MetricEvent::UntrustedIdentityHeader {
            header: header.into(),
            reason: reason.into(),
        });
    }
}

/// Forwards every emission to several sinks.
#[derive(Default, Clone)]
pub struct FanoutMetrics {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutMetrics {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }

    fn each(&self, f: impl Fn(&dyn MetricsSink)) {
        for sink in &self.sinks {
            f(sink.as_ref());
        }
    }
}

impl MetricsSink for FanoutMetrics {
    fn request_error(&self, model: &str, reason: ErrorReason) {
        self.each(|s| s.request_error(model, reason));
    }

    fn model_ttft(&self, model: &str, seconds: f64) {
        self.each(|s| s.model_ttft(model, seconds));
    }

    fn model_tokens(&self, model: &str, prompt: u64, completion: u64) {
        self.each(|s| s.model_tokens(model, prompt, completion));
    }

    fn model_completion_latency(&self, model: &str, seconds: f64) {
        self.each(|s| s.model_completion_latency(model, seconds));
    }

    fn model_tpot(&self, model: &str, seconds: f64) {
        self.each(|s| s.model_tpot(model, seconds));
    }

    fn model_cost(&self, model: &str, currency: &str, amount: f64) {
        self.each(|s| s.model_cost(model, currency, amount));
    }

    fn identity_tokens(&self, identity: &Identity, model: &str, kind: TokenKind, count: u64) {
        self.each(|s| s.identity_tokens(identity, model, kind, count));
    }

    fn identity_request(&self, identity: &Identity, model: &str, decision: &str) {
        self.each(|s| s.identity_request(identity, model, decision));
    }

    fn identity_reasoning_request(&self, identity: &Identity, model: &str) {
        self.each(|s| s.identity_reasoning_request(identity, model));
    }

    fn identity_cache_request(&self, identity: &Identity, model: &str, hit: bool) {
        self.each(|s| s.identity_cache_request(identity, model, hit));
    }

    fn untrusted_identity_header(&self, header: &'static str, reason: &'static str) {
        self.each(|s| s.untrusted_identity_header(header, reason));
    }
}
