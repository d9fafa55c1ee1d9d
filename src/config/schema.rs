//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the filter.
//! All types derive Serde traits for deserialization from config files, and
//! every section is optional: an empty file yields standalone defaults with
//! identity-scoped billing disabled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the interception filter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Identity-scoped billing integration.
    pub identity_billing: IdentityBillingConfig,

    /// Per-model parameters, keyed by model name.
    pub models: HashMap<String, ModelConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity-scoped billing integration.
///
/// When `enabled` is false every other field is ignored.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityBillingConfig {
    /// Gates the entire identity-scoped mode.
    pub enabled: bool,

    /// Where identity claims come from.
    pub authentication: AuthenticationConfig,

    /// Which identity-scoped metric families are exported.
    pub metrics: IdentityMetricsConfig,

    /// Which identity-scoped response headers are exported.
    pub headers: IdentityHeadersConfig,
}

/// Identity header names and fallbacks. Unset fields resolve to defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Header carrying the user identifier (default `x-auth-request-user`).
    pub user_header: Option<String>,

    /// Header carrying the user tier (default `x-auth-request-tier`).
    pub tier_header: Option<String>,

    /// User assigned when the header is missing or untrusted (default `unknown`).
    pub fallback_user: Option<String>,

    /// Tier assigned when the header is missing or untrusted (default `free`).
    pub fallback_tier: Option<String>,
}

/// Identity-scoped metric export switches.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityMetricsConfig {
    pub export_token_metrics: bool,
    pub export_cache_metrics: bool,
    pub export_routing_metrics: bool,
    pub export_security_metrics: bool,

    /// Keep computing costs locally while identity mode is on ("hybrid" mode).
    pub internal_cost_calculation: bool,
}

/// Identity-scoped response header switches.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityHeadersConfig {
    pub export_routing: bool,
    pub export_cache: bool,
    pub export_security: bool,

    /// Prefix for emitted header names (default `x-vsr-`).
    pub prefix: Option<String>,
}

/// Per-model parameters.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ModelConfig {
    /// Token pricing, if the model is billed locally.
    pub pricing: Option<PricingConfig>,
}

/// Per-million-token pricing for one model.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PricingConfig {
    pub prompt_per_1m: f64,
    pub completion_per_1m: f64,

    /// ISO currency code (default `USD`).
    pub currency: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9190".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_standalone() {
        let config: FilterConfig = toml::from_str("").unwrap();
        assert!(!config.identity_billing.enabled);
        assert!(config.identity_billing.headers.prefix.is_none());
        assert!(config.models.is_empty());
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_full_document() {
        let raw = r#"
            [identity_billing]
            enabled = true

            [identity_billing.authentication]
            user_header = "x-user"
            fallback_tier = "trial"

            [identity_billing.metrics]
            export_token_metrics = true
            internal_cost_calculation = true

            [identity_billing.headers]
            export_cache = true
            prefix = "x-gw-"

            [models."gpt-4".pricing]
            prompt_per_1m = 30.0
            completion_per_1m = 60.0

            [observability]
            log_format = "json"
        "#;
        let config: FilterConfig = toml::from_str(raw).unwrap();
        let billing = &config.identity_billing;
        assert!(billing.enabled);
        assert_eq!(billing.authentication.user_header.as_deref(), Some("x-user"));
        assert!(billing.authentication.tier_header.is_none());
        assert_eq!(billing.authentication.fallback_tier.as_deref(), Some("trial"));
        assert!(billing.metrics.export_token_metrics);
        assert!(!billing.metrics.export_routing_metrics);
        assert!(billing.metrics.internal_cost_calculation);
        assert!(billing.headers.export_cache);
        assert_eq!(billing.headers.prefix.as_deref(), Some("x-gw-"));

        let pricing = config.models["gpt-4"].pricing.as_ref().unwrap();
        assert_eq!(pricing.prompt_per_1m, 30.0);
        assert!(pricing.currency.is_none());
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
