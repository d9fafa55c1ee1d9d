//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject header names and prefixes that could not be emitted on the wire
//! - Ensure fallback identities are already label-safe
//! - Validate pricing ranges and the metrics bind address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FilterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::FilterConfig;
use crate::security::sanitize::sanitize_label;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a lowercase HTTP header name")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{field}: '{value}' is not label-safe (would become '{sanitized}')")]
    UnsafeFallback {
        field: &'static str,
        value: String,
        sanitized: String,
    },

    #[error("models.{model}.pricing: {reason}")]
    InvalidPricing { model: String, reason: String },

    #[error("observability.metrics_address: '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FilterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let auth = &config.identity_billing.authentication;
    for (field, value) in [
        ("identity_billing.authentication.user_header", &auth.user_header),
        ("identity_billing.authentication.tier_header", &auth.tier_header),
    ] {
        if let Some(name) = value {
            if name.is_empty() || !is_header_token(name) {
                errors.push(ValidationError::InvalidHeaderName {
                    field,
                    value: name.clone(),
                });
            }
        }
    }

    // A prefix is a fragment of a header name, so it follows the same rules.
    if let Some(prefix) = &config.identity_billing.headers.prefix {
        if !is_header_token(prefix) {
            errors.push(ValidationError::InvalidHeaderName {
                field: "identity_billing.headers.prefix",
                value: prefix.clone(),
            });
        }
    }

    for (field, value) in [
        ("identity_billing.authentication.fallback_user", &auth.fallback_user),
        ("identity_billing.authentication.fallback_tier", &auth.fallback_tier),
    ] {
        if let Some(fallback) = value {
            let sanitized = sanitize_label(fallback);
            if sanitized.modified {
                errors.push(ValidationError::UnsafeFallback {
                    field,
                    value: fallback.clone(),
                    sanitized: sanitized.value,
                });
            }
        }
    }

    for (model, params) in &config.models {
        let Some(pricing) = &params.pricing else {
            continue;
        };
        for (name, rate) in [
            ("prompt_per_1m", pricing.prompt_per_1m),
            ("completion_per_1m", pricing.completion_per_1m),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                errors.push(ValidationError::InvalidPricing {
                    model: model.clone(),
                    reason: format!("{name} must be a non-negative number, got {rate}"),
                });
            }
        }
        if let Some(currency) = &pricing.currency {
            if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
                errors.push(ValidationError::InvalidPricing {
                    model: model.clone(),
                    reason: format!("currency '{currency}' is not a 3-letter code"),
                });
            }
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// RFC 7230 token characters, restricted to lowercase.
fn is_header_token(name: &str) -> bool {
    name.bytes().all(|b| {
        b.is_ascii_lowercase()
            || b.is_ascii_digit()
            || matches!(
                b,
                b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                    | b'_' | b'`' | b'|' | b'~'
            )
    })
}
