//! Request-header phase: correlation id, identity, streaming expectation.

use tracing::Span;
use uuid::Uuid;

use crate::gate::ModeGate;
use crate::observability::metrics::MetricsSink;
use crate::observability::tracing::{record_identity, request_span};
use crate::pipeline::context::{Identity, RequestContext};
use crate::pipeline::protocol::{HeaderLookup, HeaderMap, Phase, ProcessingResponse};
use crate::security::sanitize::{sanitize_identity_tier, sanitize_identity_user, Sanitized};
use crate::security::trust::validate_trusted_header;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    User,
    Tier,
}

impl Claim {
    fn kind(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Tier => "tier",
        }
    }

    fn header_name(self, gate: &ModeGate) -> &str {
        match self {
            Self::User => gate.user_header(),
            Self::Tier => gate.tier_header(),
        }
    }

    fn fallback(self, gate: &ModeGate) -> &str {
        match self {
            Self::User => gate.fallback_user(),
            Self::Tier => gate.fallback_tier(),
        }
    }

    fn sanitize(self, value: &str) -> Sanitized {
        match self {
            Self::User => sanitize_identity_user(value),
            Self::Tier => sanitize_identity_tier(value),
        }
    }
}

/// Resolve the caller identity from the trust-boundary headers.
///
/// Returns `None` without touching `headers` when identity mode is off.
/// Never fails: rejected or missing claims fall back to the configured
/// defaults.
pub fn extract_identity<H: HeaderLookup + ?Sized>(
    headers: &H,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
    span: &Span,
) -> Option<Identity> {
    if !gate.identity_mode() {
        return None;
    }

    let user = resolve_claim(headers, gate, metrics, Claim::User);
    let tier = resolve_claim(headers, gate, metrics, Claim::Tier);
    record_identity(span, &user, &tier);

    Some(Identity::new(user, tier))
}

fn resolve_claim<H: HeaderLookup + ?Sized>(
    headers: &H,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
    claim: Claim,
) -> String {
    let name = claim.header_name(gate);
    let fallback = claim.fallback(gate);

    let value = match headers.exact(name) {
        Some(v) if !v.is_empty() => v,
        _ => {
            tracing::debug!(claim = claim.kind(), fallback, "Identity header absent, using fallback");
            return fallback.to_string();
        }
    };

    let trust = validate_trusted_header(name, value);
    if let Some(rejection) = trust.rejection() {
        // The raw value is attacker-controlled; only its length is logged.
        tracing::warn!(
            header = name,
            reason = %rejection,
            value_len = value.len(),
            fallback,
            "Untrusted identity header, using fallback"
        );
        if gate.export_security_metrics() {
            metrics.untrusted_identity_header(claim.kind(), rejection.code());
        }
        return fallback.to_string();
    }

    let sanitized = claim.sanitize(value);
    if sanitized.modified {
        tracing::warn!(header = name, sanitized = %sanitized.value, "Identity header sanitized");
    }
    tracing::debug!(header = name, value = %sanitized.value, "Identity resolved from header");
    sanitized.value
}

/// Phase handler. Never mutates the request.
pub fn handle_request_headers(
    headers: HeaderMap,
    ctx: &mut RequestContext,
    gate: &ModeGate,
    metrics: &dyn MetricsSink,
) -> ProcessingResponse {
    let request_id = headers
        .header(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

    let span = request_span(
        &request_id,
        headers.header(":method").unwrap_or_default(),
        headers.header(":path").unwrap_or_default(),
    );
    let identity = {
        let _enter = span.enter();
        extract_identity(&headers, gate, metrics, &span)
    };

    let expect_streaming = headers
        .header("accept")
        .is_some_and(|accept| accept.to_ascii_lowercase().contains(EVENT_STREAM));

    ctx.begin(request_id, headers, span);
    if let Some(identity) = identity {
        ctx.set_identity(identity);
    }
    if expect_streaming {
        tracing::debug!(request_id = ctx.request_id(), "Client expects a streaming response");
    }
    ctx.set_expect_streaming(expect_streaming);

    ProcessingResponse::proceed(Phase::RequestHeaders)
}
