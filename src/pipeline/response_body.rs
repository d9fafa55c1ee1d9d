//! Response-body phase: usage accounting, billing events, cache completion.
//!
//! Exactly one token-metric family is emitted per request: the identity
//! family in identity mode, the plain family otherwise.

use std::borrow::Cow;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::gate::{CostPolicy, ModeGate};
use crate::observability::logging::{BillingOutcome, UsageEvent};
use crate::observability::metrics::{ErrorReason, MetricsSink, TokenKind};
use crate::pipeline::context::{Identity, RequestContext};
use crate::pipeline::protocol::{Phase, ProcessingResponse};
use crate::pipeline::usage::{parse_usage, validate_token_counts, TokenCounts};

/// Phase handler.
///
/// Buffered responses are accumulated until `end_of_stream` and accounted
/// once over the whole body. Bodies arriving after the final chunk are
/// ignored.
pub fn account_response_body(
    body: &[u8],
    end_of_stream: bool,
    ctx: &mut RequestContext,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
    cache: &dyn ResponseCache,
) -> ProcessingResponse {
    let response = ProcessingResponse::proceed(Phase::ResponseBody);

    if ctx.is_response_complete() {
        tracing::debug!(request_id = ctx.request_id(), "Body after final chunk ignored");
        return response;
    }

    // SSE chunks carry no final usage block; they only time the first token.
    if ctx.is_streaming_response() {
        if let Some(ttft) = ctx.try_mark_first_token() {
            metrics.model_ttft(ctx.model_label(), ttft.as_secs_f64());
            tracing::debug!(
                request_id = ctx.request_id(),
                ttft_ms = ttft.as_millis() as u64,
                "First token observed on streamed body"
            );
        }
        if end_of_stream {
            ctx.complete_response();
            if !ctx.request_id().is_empty() {
                cache.discard_pending(ctx.request_id());
            }
        }
        return response;
    }

    ctx.buffer_response_chunk(body);
    if !end_of_stream {
        return response;
    }
    let Some(body) = ctx.complete_response() else {
        return response;
    };

    let ctx: &RequestContext = ctx;
    let completion_latency = ctx.request_start().elapsed();
    let model = ctx.model_label();

    let raw = parse_usage(&body).unwrap_or_else(|err| {
        tracing::error!(request_id = ctx.request_id(), error = %err, "Failed to parse usage from response");
        metrics.request_error(model, ErrorReason::ParseError);
        Default::default()
    });
    let usage = validate_token_counts(raw, body.len());
    for anomaly in &usage.anomalies {
        metrics.request_error(model, *anomaly);
    }
    let counts = usage.counts;

    let identity = billing_identity(ctx, gate);
    match identity.as_deref() {
        Some(identity) => record_identity_metrics(ctx, identity, counts, gate, metrics),
        None => metrics.model_tokens(model, counts.prompt, counts.completion),
    }

    let latency = completion_latency.as_secs_f64();
    metrics.model_completion_latency(model, latency);
    if counts.completion > 0 {
        metrics.model_tpot(model, latency / counts.completion as f64);
    }

    usage_event(ctx, identity.as_deref(), counts, completion_latency, gate, metrics).emit();

    if !ctx.request_id().is_empty() {
        if body.is_empty() {
            cache.discard_pending(ctx.request_id());
        } else {
            match cache.update_with_response(ctx.request_id(), &body) {
                Ok(()) => tracing::debug!(request_id = ctx.request_id(), "Cache updated"),
                Err(err) => tracing::warn!(request_id = ctx.request_id(), error = %err, "Cache update failed"),
            }
        }
    }

    response
}

/// Identity billed for this request: the resolved one, or the configured
/// fallback when identity mode is on but nothing was resolved.
fn billing_identity<'a>(ctx: &'a RequestContext, gate: &ModeGate) -> Option<Cow<'a, Identity>> {
    if !gate.identity_mode() {
        return None;
    }
    Some(match ctx.identity() {
        Some(identity) => Cow::Borrowed(identity),
        None => Cow::Owned(Identity::new(
            gate.fallback_user().into(),
            gate.fallback_tier().into(),
        )),
    })
}

/// Settle the cost of the request and build its `llm_usage` event.
fn usage_event<'a>(
    ctx: &'a RequestContext,
    identity: Option<&'a Identity>,
    counts: TokenCounts,
    completion_latency: Duration,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
) -> UsageEvent<'a> {
    let model = ctx.model_label();
    let outcome = match gate.cost_policy() {
        CostPolicy::Internal => match gate.pricing_for(model) {
            Some(pricing) => {
                let cost = pricing.cost(counts.prompt, counts.completion);
                metrics.model_cost(model, &pricing.currency, cost);
                BillingOutcome::Priced {
                    cost,
                    currency: pricing.currency.clone(),
                }
            }
            None => BillingOutcome::NotConfigured,
        },
        CostPolicy::Deferred => BillingOutcome::Deferred,
    };
    UsageEvent {
        request_id: ctx.request_id(),
        model,
        prompt_tokens: counts.prompt,
        completion_tokens: counts.completion,
        completion_latency_ms: completion_latency.as_millis(),
        user: identity.map(Identity::user),
        tier: identity.map(Identity::tier),
        outcome,
    }
}

fn record_identity_metrics(
    ctx: &RequestContext,
    identity: &Identity,
    counts: TokenCounts,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
) {
    let model = ctx.model_label();
    let routing = ctx.routing();

    if gate.export_token_metrics() {
        metrics.identity_tokens(identity, model, TokenKind::Prompt, counts.prompt);
        metrics.identity_tokens(identity, model, TokenKind::Completion, counts.completion);
    }
    if gate.export_routing_metrics() {
        metrics.identity_request(identity, model, &routing.decision);
    }
    if routing.reasoning == Some(true) {
        metrics.identity_reasoning_request(identity, model);
    }
    if gate.export_cache_metrics() {
        metrics.identity_cache_request(identity, model, routing.cache_hit);
    }
}
