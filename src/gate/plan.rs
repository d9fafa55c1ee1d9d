//! Per-phase header decision record.
//!
//! The response-header phase evaluates the gate exactly once and then works
//! from a [`HeaderPlan`], so every header in one response is built under the
//! same mode.

/// A routing signal the filter can expose as a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingSignal {
    Category,
    Decision,
    Reasoning,
    Model,
    SystemPromptInjected,
}

impl RoutingSignal {
    /// Emission order.
    pub const ALL: [RoutingSignal; 5] = [
        RoutingSignal::Category,
        RoutingSignal::Decision,
        RoutingSignal::Reasoning,
        RoutingSignal::Model,
        RoutingSignal::SystemPromptInjected,
    ];

    /// Header name in standalone deployments.
    pub fn standalone_name(self) -> &'static str {
        match self {
            Self::Category => "selected-category",
            Self::Decision => "selected-decision",
            Self::Reasoning => "selected-reasoning",
            Self::Model => "selected-model",
            Self::SystemPromptInjected => "injected-system-prompt",
        }
    }

    /// Suffix appended to the configured prefix in identity-scoped mode.
    pub fn prefixed_suffix(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Decision => "decision",
            Self::Reasoning => "reasoning-enabled",
            Self::Model => "model-selected",
            Self::SystemPromptInjected => "system-prompt-injected",
        }
    }
}

/// Naming strategy for routing headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderNaming<'a> {
    /// Fixed, prefix-free names.
    Standalone,
    /// `{prefix}{suffix}` names.
    Prefixed(&'a str),
}

impl HeaderNaming<'_> {
    pub fn key(self, signal: RoutingSignal) -> String {
        match self {
            Self::Standalone => signal.standalone_name().to_string(),
            Self::Prefixed(prefix) => format!("{prefix}{}", signal.prefixed_suffix()),
        }
    }
}

/// Which headers one response gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPlan<'a> {
    /// Naming for routing headers, or `None` when they are not exported.
    pub routing: Option<HeaderNaming<'a>>,
    /// Prefix for the cache-hit header, or `None` when it is not exported.
    pub cache_hit_prefix: Option<&'a str>,
}

impl HeaderPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.routing.is_none() && self.cache_hit_prefix.is_none()
    }
}
