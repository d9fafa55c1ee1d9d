//! Per-request state carried across phases.

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::pipeline::protocol::HeaderMap;
use crate::security::sanitize::{sanitize_label, UNKNOWN};

/// Resolved caller identity. Both values are label-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user: String,
    tier: String,
}

impl Identity {
    pub fn new(user: String, tier: String) -> Self {
        Self { user, tier }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }
}

/// What the routing engine decided for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingDecision {
    pub category: String,
    pub decision: String,
    pub selected_model: String,
    /// `None` when the engine made no reasoning choice.
    pub reasoning: Option<bool>,
    pub system_prompt_injected: bool,
    pub cache_hit: bool,
}

impl RoutingDecision {
    /// Header rendering of the reasoning flag.
    pub fn reasoning_mode(&self) -> &'static str {
        match self.reasoning {
            Some(true) => "on",
            Some(false) => "off",
            None => "",
        }
    }
}

/// State for one request, owned by its pipeline.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    headers: HeaderMap,
    identity: Option<Identity>,
    routing: RoutingDecision,
    request_model: String,

    request_start: Instant,
    processing_start: Option<Instant>,
    first_token_latency: Option<Duration>,

    expect_streaming: bool,
    streaming_response: bool,

    /// Buffered-response fragments waiting for the final chunk.
    response_body: BytesMut,
    response_complete: bool,

    span: Span,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: String::new(),
            headers: HeaderMap::new(),
            identity: None,
            routing: RoutingDecision::default(),
            request_model: String::new(),
            request_start: Instant::now(),
            processing_start: None,
            first_token_latency: None,
            expect_streaming: false,
            streaming_response: false,
            response_body: BytesMut::new(),
            response_complete: false,
            span: Span::none(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn routing(&self) -> &RoutingDecision {
        &self.routing
    }

    pub fn request_model(&self) -> &str {
        &self.request_model
    }

    pub fn request_start(&self) -> Instant {
        self.request_start
    }

    pub fn processing_start(&self) -> Option<Instant> {
        self.processing_start
    }

    pub fn first_token_latency(&self) -> Option<Duration> {
        self.first_token_latency
    }

    pub fn expects_streaming(&self) -> bool {
        self.expect_streaming
    }

    pub fn is_streaming_response(&self) -> bool {
        self.streaming_response
    }

    /// Whether the final response chunk has been handled.
    pub fn is_response_complete(&self) -> bool {
        self.response_complete
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Model used for metric labels and pricing: the routed model, then the
    /// client's, then `unknown`.
    pub fn model_label(&self) -> &str {
        if !self.routing.selected_model.is_empty() {
            &self.routing.selected_model
        } else if !self.request_model.is_empty() {
            &self.request_model
        } else {
            UNKNOWN
        }
    }

    /// Record the routing decision and stamp the start of processing.
    ///
    /// Every name the engine hands back ends up in a metric label, so all of
    /// them are label-sanitized here.
    pub fn apply_decision(&mut self, mut decision: RoutingDecision) {
        for name in [
            &mut decision.selected_model,
            &mut decision.decision,
            &mut decision.category,
        ] {
            *name = label_or_empty(name);
        }
        self.routing = decision;
        self.start_processing();
    }

    pub fn start_processing(&mut self) {
        self.start_processing_at(Instant::now());
    }

    pub fn start_processing_at(&mut self, at: Instant) {
        self.processing_start = Some(at);
    }

    /// Returns the first-token latency the first time it can be measured,
    /// and `None` on every later call.
    pub fn try_mark_first_token(&mut self) -> Option<Duration> {
        if self.first_token_latency.is_some() {
            return None;
        }
        let elapsed = self.processing_start?.elapsed();
        if elapsed.is_zero() {
            return None;
        }
        self.first_token_latency = Some(elapsed);
        Some(elapsed)
    }

    pub(crate) fn begin(&mut self, request_id: String, headers: HeaderMap, span: Span) {
        self.request_start = Instant::now();
        self.request_id = request_id;
        self.headers = headers;
        self.span = span;
    }

    /// Identity is written once; later attempts are ignored.
    pub(crate) fn set_identity(&mut self, identity: Identity) -> bool {
        if self.identity.is_some() {
            tracing::debug!(request_id = %self.request_id, "Identity already resolved, ignoring");
            return false;
        }
        self.identity = Some(identity);
        true
    }

    pub(crate) fn set_request_model(&mut self, model: &str) {
        self.request_model = label_or_empty(model);
    }

    pub(crate) fn set_expect_streaming(&mut self, expect: bool) {
        self.expect_streaming = expect;
    }

    pub(crate) fn set_streaming_response(&mut self, streaming: bool) {
        self.streaming_response = streaming;
    }

    pub(crate) fn buffer_response_chunk(&mut self, chunk: &[u8]) {
        self.response_body.extend_from_slice(chunk);
    }

    /// Close the response. Returns the buffered body the first time and
    /// `None` on every later call.
    pub(crate) fn complete_response(&mut self) -> Option<Bytes> {
        if self.response_complete {
            return None;
        }
        self.response_complete = true;
        Some(std::mem::take(&mut self.response_body).freeze())
    }
}

/// Label-sanitized `value`, or empty when nothing usable is left.
fn label_or_empty(value: &str) -> String {
    let label = sanitize_label(value).value;
    if label == UNKNOWN {
        String::new()
    } else {
        label
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
