//! Phase dispatch.
//!
//! A [`Processor`] holds the shared collaborators and the current
//! configuration snapshot. Each request gets a [`RequestPipeline`] that pins
//! the snapshot current at its start, so a reload never changes mode halfway
//! through a request.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cache::{NoopCache, ResponseCache};
use crate::gate::ModeGate;
use crate::observability::metrics::MetricsSink;
use crate::pipeline::context::RequestContext;
use crate::pipeline::protocol::{PhaseEvent, ProcessingResponse};
use crate::pipeline::request_body::{handle_request_body, DecisionEngine, ModelEchoEngine};
use crate::pipeline::request_headers::handle_request_headers;
use crate::pipeline::response_body::account_response_body;
use crate::pipeline::response_headers::emit_response_headers;

pub struct Processor {
    gate: ArcSwap<ModeGate>,
    metrics: Arc<dyn MetricsSink>,
    cache: Arc<dyn ResponseCache>,
    engine: Arc<dyn DecisionEngine>,
}

impl Processor {
    /// Processor with no cache and a pass-through routing engine.
    pub fn new(gate: ModeGate, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            gate: ArcSwap::from_pointee(gate),
            metrics,
            cache: Arc::new(NoopCache),
            engine: Arc::new(ModelEchoEngine),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn DecisionEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Swap in a new snapshot. Requests already started keep the old one.
    pub fn reload(&self, gate: ModeGate) {
        tracing::info!(identity_mode = gate.identity_mode(), "Configuration snapshot reloaded");
        self.gate.store(Arc::new(gate));
    }

    pub fn gate(&self) -> Arc<ModeGate> {
        self.gate.load_full()
    }

    pub fn start_request(&self) -> RequestPipeline {
        RequestPipeline {
            gate: self.gate.load_full(),
            metrics: Arc::clone(&self.metrics),
            cache: Arc::clone(&self.cache),
            engine: Arc::clone(&self.engine),
            ctx: RequestContext::new(),
        }
    }
}

/// State machine for one request.
pub struct RequestPipeline {
    gate: Arc<ModeGate>,
    metrics: Arc<dyn MetricsSink>,
    cache: Arc<dyn ResponseCache>,
    engine: Arc<dyn DecisionEngine>,
    ctx: RequestContext,
}

impl RequestPipeline {
    pub fn handle(&mut self, event: PhaseEvent) -> ProcessingResponse {
        let span = self.ctx.span().clone();
        let _enter = span.enter();

        match event {
            PhaseEvent::RequestHeaders { headers } => {
                handle_request_headers(headers, &mut self.ctx, &self.gate, self.metrics.as_ref())
            }
            PhaseEvent::RequestBody { body } => {
                handle_request_body(&body, &mut self.ctx, self.engine.as_ref(), self.cache.as_ref())
            }
            PhaseEvent::ResponseHeaders { headers, status } => emit_response_headers(
                &headers,
                status,
                &mut self.ctx,
                &self.gate,
                self.metrics.as_ref(),
            ),
            PhaseEvent::ResponseBody { body, end_of_stream } => account_response_body(
                &body,
                end_of_stream,
                &mut self.ctx,
                &self.gate,
                self.metrics.as_ref(),
                self.cache.as_ref(),
            ),
        }
    }

    pub fn gate(&self) -> &ModeGate {
        &self.gate
    }

    /// True once the final response chunk has been handled.
    pub fn is_complete(&self) -> bool {
        self.ctx.is_response_complete()
    }

    /// Give up on a request that will never complete.
    pub fn abandon(&mut self) {
        if !self.is_complete() && !self.ctx.request_id().is_empty() {
            self.cache.discard_pending(self.ctx.request_id());
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.ctx
    }
}
