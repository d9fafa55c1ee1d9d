//! Resolved configuration snapshot.

use crate::config::schema::FilterConfig;
use crate::gate::plan::{HeaderNaming, HeaderPlan};
use crate::gate::pricing::{ModelPricing, PricingTable};

pub const DEFAULT_HEADER_PREFIX: &str = "x-vsr-";
pub const DEFAULT_USER_HEADER: &str = "x-auth-request-user";
pub const DEFAULT_TIER_HEADER: &str = "x-auth-request-tier";
pub const DEFAULT_FALLBACK_USER: &str = "unknown";
pub const DEFAULT_FALLBACK_TIER: &str = "free";

/// Where the cost of a request is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostPolicy {
    /// The filter prices requests itself.
    Internal,
    /// Pricing is left to the external billing system.
    Deferred,
}

/// Immutable, fully defaulted view of the configuration.
///
/// Built once per configuration load. Every optional field is resolved here so
/// the request path never re-checks presence. All identity-scoped predicates
/// are false while identity mode is off.
#[derive(Debug, Clone)]
pub struct ModeGate {
    identity_mode: bool,

    export_token_metrics: bool,
    export_cache_metrics: bool,
    export_routing_metrics: bool,
    export_security_metrics: bool,
    export_routing_headers: bool,
    export_cache_headers: bool,
    export_security_headers: bool,
    internal_cost_calculation: bool,

    header_prefix: String,
    user_header: String,
    tier_header: String,
    fallback_user: String,
    fallback_tier: String,

    pricing: PricingTable,
}

impl ModeGate {
    pub fn from_config(config: &FilterConfig) -> Self {
        let billing = &config.identity_billing;
        let on = billing.enabled;
        let auth = &billing.authentication;

        Self {
            identity_mode: on,

            export_token_metrics: on && billing.metrics.export_token_metrics,
            export_cache_metrics: on && billing.metrics.export_cache_metrics,
            export_routing_metrics: on && billing.metrics.export_routing_metrics,
            export_security_metrics: on && billing.metrics.export_security_metrics,
            export_routing_headers: on && billing.headers.export_routing,
            export_cache_headers: on && billing.headers.export_cache,
            export_security_headers: on && billing.headers.export_security,
            // Standalone deployments always price locally.
            internal_cost_calculation: !on || billing.metrics.internal_cost_calculation,

            header_prefix: or_default(&billing.headers.prefix, DEFAULT_HEADER_PREFIX),
            user_header: or_default(&auth.user_header, DEFAULT_USER_HEADER),
            tier_header: or_default(&auth.tier_header, DEFAULT_TIER_HEADER),
            fallback_user: or_default(&auth.fallback_user, DEFAULT_FALLBACK_USER),
            fallback_tier: or_default(&auth.fallback_tier, DEFAULT_FALLBACK_TIER),

            pricing: PricingTable::from_models(&config.models),
        }
    }

    pub fn identity_mode(&self) -> bool {
        self.identity_mode
    }

    pub fn export_token_metrics(&self) -> bool {
        self.export_token_metrics
    }

    pub fn export_cache_metrics(&self) -> bool {
        self.export_cache_metrics
    }

    pub fn export_routing_metrics(&self) -> bool {
        self.export_routing_metrics
    }

    pub fn export_security_metrics(&self) -> bool {
        self.export_security_metrics
    }

    pub fn export_routing_headers(&self) -> bool {
        self.export_routing_headers
    }

    pub fn export_cache_headers(&self) -> bool {
        self.export_cache_headers
    }

    /// Security-signal headers are produced by the request-body stage; the
    /// flag is resolved here so every stage reads the same snapshot.
    pub fn export_security_headers(&self) -> bool {
        self.export_security_headers
    }

    pub fn calculate_costs_internally(&self) -> bool {
        self.internal_cost_calculation
    }

    pub fn cost_policy(&self) -> CostPolicy {
        if self.internal_cost_calculation {
            CostPolicy::Internal
        } else {
            CostPolicy::Deferred
        }
    }

    pub fn header_prefix(&self) -> &str {
        &self.header_prefix
    }

    pub fn user_header(&self) -> &str {
        &self.user_header
    }

    pub fn tier_header(&self) -> &str {
        &self.tier_header
    }

    pub fn fallback_user(&self) -> &str {
        &self.fallback_user
    }

    pub fn fallback_tier(&self) -> &str {
        &self.fallback_tier
    }

    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }

    /// Decide, once, which response headers this snapshot produces.
    pub fn header_plan(&self) -> HeaderPlan<'_> {
        if !self.identity_mode {
            return HeaderPlan {
                routing: Some(HeaderNaming::Standalone),
                cache_hit_prefix: None,
            };
        }
        let prefix = self.header_prefix.as_str();
        HeaderPlan {
            routing: self
                .export_routing_headers
                .then_some(HeaderNaming::Prefixed(prefix)),
            cache_hit_prefix: self.export_cache_headers.then_some(prefix),
        }
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

fn or_default(value: &Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => default.to_string(),
    }
}
