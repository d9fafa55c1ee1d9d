//! Identity-aware inference request filter.
//!
//! Sits on the data path between a client-facing gateway and a model-serving
//! backend, driven one phase event at a time.
//!
//! # Architecture Overview
//!
//! ```text
//!   Gateway phase events
//!          │
//!          ▼
//!   ┌──────────────┐    ┌──────────────┐    ┌──────────────────────┐
//!   │   session    │───▶│  processor   │───▶│ request/response     │
//!   │ (tokio task) │    │ (ModeGate    │    │ phase handlers       │
//!   └──────────────┘    │  snapshot)   │    └──────────┬───────────┘
//!                       └──────────────┘               │
//!          ┌───────────────────┬───────────────────────┼──────────────┐
//!          ▼                   ▼                       ▼              ▼
//!   ┌─────────────┐    ┌──────────────┐    ┌────────────────┐  ┌───────────┐
//!   │  security   │    │     gate     │    │ observability  │  │   cache   │
//!   │ sanitize +  │    │  predicates, │    │ MetricsSink,   │  │ Response  │
//!   │ trust check │    │  pricing     │    │ llm_usage logs │  │ Cache     │
//!   └─────────────┘    └──────────────┘    └────────────────┘  └───────────┘
//! ```

pub mod cache;
pub mod config;
pub mod gate;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::FilterConfig;
pub use gate::ModeGate;
pub use pipeline::{Processor, RequestPipeline, Session};
