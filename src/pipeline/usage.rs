//! Backend usage telemetry.

use serde::Deserialize;
use thiserror::Error;

use crate::observability::metrics::ErrorReason;

/// Counts above this are flagged for investigation but kept.
pub const MAX_REASONABLE_TOKENS: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum UsageParseError {
    #[error("malformed usage payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Token counts as reported by the backend, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

#[derive(Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    usage: RawUsage,
}

/// Read `usage.prompt_tokens` / `usage.completion_tokens` from a completion
/// body. A body without a usage block parses as zero usage.
pub fn parse_usage(body: &[u8]) -> Result<RawUsage, UsageParseError> {
    let envelope: CompletionEnvelope = serde_json::from_slice(body)?;
    Ok(envelope.usage)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub prompt: u64,
    pub completion: u64,
}

/// Validated counts plus the anomalies found on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUsage {
    pub counts: TokenCounts,
    pub anomalies: Vec<ErrorReason>,
}

/// Clamp negatives to zero and flag suspicious counts.
///
/// Negative counts are clamped; excessive counts are only flagged.
pub fn validate_token_counts(raw: RawUsage, body_len: usize) -> ValidatedUsage {
    let mut anomalies = Vec::new();

    if raw.prompt_tokens < 0 || raw.completion_tokens < 0 {
        tracing::warn!(
            prompt = raw.prompt_tokens,
            completion = raw.completion_tokens,
            "Negative token counts reported, clamping to zero"
        );
        anomalies.push(ErrorReason::InvalidTokenCount);
    }
    let counts = TokenCounts {
        prompt: raw.prompt_tokens.max(0) as u64,
        completion: raw.completion_tokens.max(0) as u64,
    };

    if counts.prompt == 0 && counts.completion == 0 && body_len > 0 {
        tracing::warn!("Zero token counts reported for a non-empty response");
        anomalies.push(ErrorReason::ZeroTokenCount);
    }

    if counts.prompt > MAX_REASONABLE_TOKENS || counts.completion > MAX_REASONABLE_TOKENS {
        tracing::warn!(
            prompt = counts.prompt,
            completion = counts.completion,
            max = MAX_REASONABLE_TOKENS,
            "Unusually large token counts reported"
        );
        anomalies.push(ErrorReason::ExcessiveTokenCount);
    }

    ValidatedUsage { counts, anomalies }
}
