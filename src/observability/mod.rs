//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline phases produce:
//!     → logging.rs (structured log events, llm_usage billing records)
//!     → metrics.rs (counters, gauges, histograms through MetricsSink)
//!     → tracing.rs (one span per request, identity recorded late)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → In-memory recorder (replay CLI, tests)
//! ```
//!
//! # Design Decisions
//! - The pipeline only sees the `MetricsSink` trait, never the registry
//! - Request ID flows through every phase via the request span
//! - Metric label values are sanitized before they get here

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{init_logging, BillingOutcome, UsageEvent};
pub use metrics::{
    init_metrics, ErrorReason, FanoutMetrics, MemoryMetrics, MetricEvent, MetricsSink, PrometheusMetrics,
    TokenKind,
};
