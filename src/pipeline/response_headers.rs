//! Response-header phase: streaming detection, upstream status, routing headers.

use crate::gate::{HeaderNaming, HeaderPlan, ModeGate, RoutingSignal};
use crate::observability::metrics::{ErrorReason, MetricsSink};
use crate::pipeline::context::{RequestContext, RoutingDecision};
use crate::pipeline::protocol::{
    BodyMode, HeaderEntry, HeaderLookup, Phase, ProcessingResponse,
};
use crate::pipeline::request_headers::EVENT_STREAM;
use crate::security::sanitize::sanitize_header;

pub const STATUS_PSEUDO_HEADER: &str = ":status";

pub fn emit_response_headers<H: HeaderLookup + ?Sized>(
    headers: &H,
    status: Option<u16>,
    ctx: &mut RequestContext,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
) -> ProcessingResponse {
    let streaming = is_event_stream(headers);
    ctx.set_streaming_response(streaming);

    // Streamed responses measure on the first body chunk instead.
    if !streaming {
        if let Some(ttft) = ctx.try_mark_first_token() {
            metrics.model_ttft(ctx.model_label(), ttft.as_secs_f64());
        }
    }

    let status = status.or_else(|| status_from_headers(headers));
    match status {
        Some(code) if code >= 500 => metrics.request_error(ctx.model_label(), ErrorReason::Upstream5xx),
        Some(code) if code >= 400 => metrics.request_error(ctx.model_label(), ErrorReason::Upstream4xx),
        _ => {}
    }

    let mut response = ProcessingResponse::proceed(Phase::ResponseHeaders);
    let successful = status.is_some_and(|code| (200..300).contains(&code));
    if successful && !ctx.routing().cache_hit {
        response.set_headers = planned_headers(ctx.routing(), gate.header_plan());
    }
    if streaming {
        response.mode_override = Some(BodyMode::Streamed);
    }
    response
}

/// Every header one plan produces, routing headers first.
pub fn planned_headers(decision: &RoutingDecision, plan: HeaderPlan<'_>) -> Vec<HeaderEntry> {
    let mut headers = plan
        .routing
        .map(|naming| routing_headers(decision, naming))
        .unwrap_or_default();
    if let Some(prefix) = plan.cache_hit_prefix {
        headers.push(HeaderEntry::new(
            format!("{prefix}cache-hit"),
            bool_literal(decision.cache_hit),
        ));
    }
    headers
}

/// Routing headers under one naming strategy. Empty signals are skipped; the
/// system-prompt flag is always present.
pub fn routing_headers(decision: &RoutingDecision, naming: HeaderNaming<'_>) -> Vec<HeaderEntry> {
    RoutingSignal::ALL
        .iter()
        .filter_map(|&signal| {
            let value = match signal {
                RoutingSignal::Category => header_value(&decision.category),
                RoutingSignal::Decision => header_value(&decision.decision),
                RoutingSignal::Reasoning => header_value(decision.reasoning_mode()),
                RoutingSignal::Model => header_value(&decision.selected_model),
                RoutingSignal::SystemPromptInjected => {
                    Some(bool_literal(decision.system_prompt_injected).to_string())
                }
            }?;
            Some(HeaderEntry::new(naming.key(signal), value))
        })
        .collect()
}

fn header_value(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(sanitize_header(raw).value)
}

fn bool_literal(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

fn is_event_stream<H: HeaderLookup + ?Sized>(headers: &H) -> bool {
    headers
        .header("content-type")
        .is_some_and(|v| v.to_ascii_lowercase().contains(EVENT_STREAM))
}

fn status_from_headers<H: HeaderLookup + ?Sized>(headers: &H) -> Option<u16> {
    headers.header(STATUS_PSEUDO_HEADER)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::observability::metrics::{MemoryMetrics, MetricEvent};
    use crate::pipeline::protocol::HeaderMap;

    fn gate(raw: &str) -> ModeGate {
        ModeGate::from_config(&parse_config(raw).unwrap())
    }

    fn routed_context() -> RequestContext {
        let mut ctx = RequestContext::new();
        ctx.apply_decision(RoutingDecision {
            category: "math".into(),
            decision: "math_problem".into(),
            selected_model: "qwen3".into(),
            reasoning: Some(true),
            system_prompt_injected: false,
            cache_hit: false,
        });
        ctx
    }

    fn keys(response: &ProcessingResponse) -> Vec<&str> {
        response.set_headers.iter().map(|h| h.key.as_str()).collect()
    }

    #[test]
    fn test_standalone_headers() {
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        let response =
            emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &ModeGate::default(), &sink);
        assert_eq!(
            keys(&response),
            [
                "selected-category",
                "selected-decision",
                "selected-reasoning",
                "selected-model",
                "injected-system-prompt",
            ]
        );
        assert_eq!(response.header("selected-reasoning"), Some("on"));
        assert_eq!(response.header("injected-system-prompt"), Some("false"));
        assert_eq!(response.mode_override, None);
    }

    #[test]
    fn test_prefixed_headers_with_cache_hit() {
        let g = gate(
            r#"
            [identity_billing]
            enabled = true
            [identity_billing.headers]
            export_routing = true
            export_cache = true
            "#,
        );
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        let response = emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &g, &sink);
        assert_eq!(response.header("x-vsr-category"), Some("math"));
        assert_eq!(response.header("x-vsr-decision"), Some("math_problem"));
        assert_eq!(response.header("x-vsr-reasoning-enabled"), Some("on"));
        assert_eq!(response.header("x-vsr-model-selected"), Some("qwen3"));
        assert_eq!(response.header("x-vsr-system-prompt-injected"), Some("false"));
        assert_eq!(response.header("x-vsr-cache-hit"), Some("false"));
        assert_eq!(response.header("selected-category"), None);
    }

    #[test]
    fn test_identity_mode_without_header_export() {
        let g = gate("[identity_billing]\nenabled = true\n");
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        let response = emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &g, &sink);
        assert!(response.set_headers.is_empty());
    }

    #[test]
    fn test_header_values_sanitized() {
        let sink = MemoryMetrics::new();
        let mut ctx = RequestContext::new();
        ctx.apply_decision(RoutingDecision {
            category: "math\r\nx-injected: yes".into(),
            ..Default::default()
        });
        let response =
            emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &ModeGate::default(), &sink);
        let category = response.header("selected-category").unwrap();
        assert!(!category.contains(['\r', '\n']));
        assert_eq!(category, "math__x-injected:_yes");
    }

    #[test]
    fn test_upstream_status_classification() {
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        let headers: HeaderMap = [(":status", "503")].into_iter().collect();
        let response = emit_response_headers(&headers, None, &mut ctx, &ModeGate::default(), &sink);
        assert!(response.set_headers.is_empty());

        let mut ctx = routed_context();
        emit_response_headers(&HeaderMap::new(), Some(429), &mut ctx, &ModeGate::default(), &sink);

        let errors: Vec<ErrorReason> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MetricEvent::RequestError { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(errors, [ErrorReason::Upstream5xx, ErrorReason::Upstream4xx]);
    }

    #[test]
    fn test_cache_hit_suppresses_headers() {
        let sink = MemoryMetrics::new();
        let mut ctx = RequestContext::new();
        ctx.apply_decision(RoutingDecision {
            category: "math".into(),
            cache_hit: true,
            ..Default::default()
        });
        let response =
            emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &ModeGate::default(), &sink);
        assert!(response.set_headers.is_empty());
    }

    #[test]
    fn test_streaming_defers_ttft() {
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        let headers: HeaderMap = [("Content-Type", "text/event-stream; charset=utf-8")]
            .into_iter()
            .collect();
        let response = emit_response_headers(&headers, Some(200), &mut ctx, &ModeGate::default(), &sink);
        assert_eq!(response.mode_override, Some(BodyMode::Streamed));
        assert!(ctx.is_streaming_response());
        assert_eq!(ctx.first_token_latency(), None);
        assert_eq!(sink.count(|e| matches!(e, MetricEvent::ModelTtft { .. })), 0);
    }

    #[test]
    fn test_buffered_records_ttft() {
        let sink = MemoryMetrics::new();
        let mut ctx = routed_context();
        std::thread::sleep(std::time::Duration::from_millis(2));
        emit_response_headers(&HeaderMap::new(), Some(200), &mut ctx, &ModeGate::default(), &sink);
        assert!(ctx.first_token_latency().is_some());
        assert_eq!(sink.count(|e| matches!(e, MetricEvent::ModelTtft { .. })), 1);
    }
}
