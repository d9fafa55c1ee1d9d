//! Per-request spans.
//!
//! The span is opened in the request-header phase with the identity fields
//! declared empty, and the fields are recorded once identity is resolved.

use tracing::field::Empty;
use tracing::Span;

pub const IDENTITY_USER_FIELD: &str = "identity.user";
pub const IDENTITY_TIER_FIELD: &str = "identity.tier";

/// Open the span that covers every phase of one request.
pub fn request_span(request_id: &str, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "filter_request",
        request_id = request_id,
        http.method = method,
        http.path = path,
        identity.user = Empty,
        identity.tier = Empty,
    )
}

/// Attach the resolved identity to a request span.
pub fn record_identity(span: &Span, user: &str, tier: &str) {
    if span.is_disabled() {
        return;
    }
    span.record(IDENTITY_USER_FIELD, user);
    span.record(IDENTITY_TIER_FIELD, tier);
}
