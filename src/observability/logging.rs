//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber
//! - Emit `llm_usage` billing events
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use serde::Serialize;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Target of the per-request usage event.
pub const USAGE_TARGET: &str = "llm_usage";

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// How the cost of a request was settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pricing", rename_all = "snake_case")]
pub enum BillingOutcome {
    /// Priced locally from the model table.
    Priced { cost: f64, currency: String },
    /// Local pricing was requested but the model has none.
    NotConfigured,
    /// Pricing happens downstream.
    Deferred,
}

/// One completed request, as seen by billing.
#[derive(Debug, Clone, Serialize)]
pub struct UsageEvent<'a> {
    pub request_id: &'a str,
    pub model: &'a str,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub completion_latency_ms: u128,
    pub user: Option<&'a str>,
    pub tier: Option<&'a str>,
    pub outcome: BillingOutcome,
}

impl UsageEvent<'_> {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Log under the `llm_usage` target.
    pub fn emit(&self) {
        let user = self.user.unwrap_or_default();
        let tier = self.tier.unwrap_or_default();
        match &self.outcome {
            BillingOutcome::Priced { cost, currency } => tracing::info!(
                target: USAGE_TARGET,
                request_id = self.request_id,
                model = self.model,
                prompt_tokens = self.prompt_tokens,
                completion_tokens = self.completion_tokens,
                total_tokens = self.total_tokens(),
                completion_latency_ms = self.completion_latency_ms as u64,
                cost = *cost,
                currency = currency.as_str(),
                user,
                tier,
                "llm_usage"
            ),
            BillingOutcome::NotConfigured => tracing::info!(
                target: USAGE_TARGET,
                request_id = self.request_id,
                model = self.model,
                prompt_tokens = self.prompt_tokens,
                completion_tokens = self.completion_tokens,
                total_tokens = self.total_tokens(),
                completion_latency_ms = self.completion_latency_ms as u64,
                cost = 0.0,
                currency = "unknown",
                pricing = "not_configured",
                user,
                tier,
                "llm_usage"
            ),
            BillingOutcome::Deferred => tracing::info!(
                target: USAGE_TARGET,
                request_id = self.request_id,
                model = self.model,
                prompt_tokens = self.prompt_tokens,
                completion_tokens = self.completion_tokens,
                total_tokens = self.total_tokens(),
                completion_latency_ms = self.completion_latency_ms as u64,
                user,
                tier,
                billing_mode = "deferred",
                "llm_usage"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory writer for a scoped JSON subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Emit `event` under a JSON subscriber and return its fields.
    fn emitted_fields(event: &UsageEvent<'_>) -> serde_json::Value {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || event.emit());

        let bytes = captured.0.lock().unwrap().clone();
        let line = String::from_utf8(bytes).unwrap();
        let json: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(json["target"], USAGE_TARGET);
        json["fields"].clone()
    }

    fn event(outcome: BillingOutcome) -> UsageEvent<'static> {
        UsageEvent {
            request_id: "req-9",
            model: "qwen3",
            prompt_tokens: 10,
            completion_tokens: 5,
            completion_latency_ms: 42,
            user: Some("alice"),
            tier: Some("premium"),
            outcome,
        }
    }

    #[test]
    fn test_priced_event_fields() {
        let fields = emitted_fields(&event(BillingOutcome::Priced {
            cost: 0.25,
            currency: "EUR".into(),
        }));
        assert_eq!(fields["cost"], 0.25);
        assert_eq!(fields["currency"], "EUR");
        assert_eq!(fields["total_tokens"], 15);
        assert_eq!(fields["completion_latency_ms"], 42);
        assert!(fields.get("pricing").is_none());
    }

    #[test]
    fn test_not_configured_event_fields() {
        let fields = emitted_fields(&event(BillingOutcome::NotConfigured));
        assert_eq!(fields["pricing"], "not_configured");
        assert_eq!(fields["cost"], 0.0);
    }

    #[test]
    fn test_deferred_event_fields() {
        let fields = emitted_fields(&event(BillingOutcome::Deferred));
        assert_eq!(fields["billing_mode"], "deferred");
        assert_eq!(fields["user"], "alice");
        assert_eq!(fields["tier"], "premium");
        assert_eq!(fields["request_id"], "req-9");
        assert!(fields.get("cost").is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        let priced = BillingOutcome::Priced { cost: 0.5, currency: "USD".into() };
        let json = serde_json::to_value(&priced).unwrap();
        assert_eq!(json["pricing"], "priced");
        assert_eq!(json["currency"], "USD");

        let json = serde_json::to_value(BillingOutcome::NotConfigured).unwrap();
        assert_eq!(json["pricing"], "not_configured");
    }

    #[test]
    fn test_total_tokens_saturates() {
        let event = UsageEvent {
            request_id: "r",
            model: "m",
            prompt_tokens: u64::MAX,
            completion_tokens: 1,
            completion_latency_ms: 0,
            user: None,
            tier: None,
            outcome: BillingOutcome::Deferred,
        };
        assert_eq!(event.total_tokens(), u64::MAX);
        event.emit();
    }
}
