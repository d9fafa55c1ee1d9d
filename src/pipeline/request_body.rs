//! Request-body phase: hand the request to the routing engine.
//!
//! Classification itself lives behind [`DecisionEngine`]; this phase only
//! extracts what the engine needs, applies its decision and registers the
//! request with the cache.

use serde::Deserialize;

use crate::cache::ResponseCache;
use crate::pipeline::context::{RequestContext, RoutingDecision};
use crate::pipeline::protocol::{Phase, ProcessingResponse};

/// What the routing engine sees of a request.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub model: &'a str,
    pub query: &'a str,
    pub body: &'a [u8],
}

/// Call contract for the routing engine.
pub trait DecisionEngine: Send + Sync {
    /// `None` leaves the request unrouted.
    fn decide(&self, request: &RouteRequest<'_>) -> Option<RoutingDecision>;
}

impl<F> DecisionEngine for F
where
    F: Fn(&RouteRequest<'_>) -> Option<RoutingDecision> + Send + Sync,
{
    fn decide(&self, request: &RouteRequest<'_>) -> Option<RoutingDecision> {
        self(request)
    }
}

/// Routes every request to the model the client asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelEchoEngine;

impl DecisionEngine for ModelEchoEngine {
    fn decide(&self, request: &RouteRequest<'_>) -> Option<RoutingDecision> {
        if request.model.is_empty() {
            return None;
        }
        Some(RoutingDecision {
            selected_model: request.model.to_string(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

impl ChatRequest {
    /// Text of the last user message.
    fn query(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

pub fn handle_request_body(
    body: &[u8],
    ctx: &mut RequestContext,
    engine: &dyn DecisionEngine,
    cache: &dyn ResponseCache,
) -> ProcessingResponse {
    let request: ChatRequest = serde_json::from_slice(body).unwrap_or_else(|err| {
        tracing::debug!(request_id = ctx.request_id(), error = %err, "Request body is not a chat completion");
        ChatRequest::default()
    });
    ctx.set_request_model(&request.model);

    let route = RouteRequest {
        model: ctx.request_model(),
        query: request.query(),
        body,
    };
    match engine.decide(&route) {
        Some(decision) => {
            tracing::debug!(
                request_id = ctx.request_id(),
                decision = %decision.decision,
                model = %decision.selected_model,
                "Routing decision applied"
            );
            ctx.apply_decision(decision);
        }
        None => ctx.start_processing(),
    }

    if !ctx.routing().cache_hit && !ctx.request_id().is_empty() {
        cache.add_pending(ctx.request_id(), ctx.model_label(), request.query());
    }

    ProcessingResponse::proceed(Phase::RequestBody)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryResponseCache;

    const CHAT: &[u8] = br#"{
        "model": "gpt-4o",
        "messages": [
            {"role": "system", "content": "be terse"},
            {"role": "user", "content": "what is 2+2"}
        ]
    }"#;

    fn context(id: &str) -> RequestContext {
        let mut ctx = RequestContext::new();
        ctx.begin(id.into(), Default::default(), tracing::Span::none());
        ctx
    }

    #[test]
    fn test_echo_engine_routes_requested_model() {
        let cache = InMemoryResponseCache::new();
        let mut ctx = context("req-1");
        handle_request_body(CHAT, &mut ctx, &ModelEchoEngine, &cache);

        assert_eq!(ctx.request_model(), "gpt-4o");
        assert_eq!(ctx.routing().selected_model, "gpt-4o");
        assert!(ctx.processing_start().is_some());
        assert_eq!(cache.pending(), 1);
    }

    #[test]
    fn test_closure_engine_sees_query() {
        let cache = InMemoryResponseCache::new();
        let mut ctx = context("req-1");
        let engine = |req: &RouteRequest<'_>| {
            (req.query == "what is 2+2").then(|| RoutingDecision {
                category: "math".into(),
                decision: "math_problem".into(),
                selected_model: "qwen3".into(),
                ..Default::default()
            })
        };
        handle_request_body(CHAT, &mut ctx, &engine, &cache);
        assert_eq!(ctx.routing().category, "math");
        assert_eq!(ctx.model_label(), "qwen3");
    }

    #[test]
    fn test_unparseable_body_still_starts_processing() {
        let cache = InMemoryResponseCache::new();
        let mut ctx = context("");
        handle_request_body(b"\x00binary", &mut ctx, &ModelEchoEngine, &cache);
        assert!(ctx.processing_start().is_some());
        assert_eq!(ctx.model_label(), "unknown");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_hit_not_registered() {
        let cache = InMemoryResponseCache::new();
        let mut ctx = context("req-1");
        let engine = |_: &RouteRequest<'_>| {
            Some(RoutingDecision {
                cache_hit: true,
                ..Default::default()
            })
        };
        handle_request_body(CHAT, &mut ctx, &engine, &cache);
        assert!(cache.is_empty());
    }
}
