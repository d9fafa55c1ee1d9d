//! Per-request interception pipeline.
//!
//! # Data Flow
//! ```text
//! Transport event
//!     → session.rs (one task per request, mpsc in / mpsc out)
//!     → processor.rs (pins the ModeGate snapshot, dispatches by phase)
//!         → request_headers.rs  (correlation id, identity, span)
//!         → request_body.rs     (DecisionEngine, cache registration)
//!         → response_headers.rs (status, TTFT, routing headers)
//!         → response_body.rs    (usage.rs, metrics, llm_usage, cache)
//!     → ProcessingResponse (always "continue")
//! ```
//!
//! # Design Decisions
//! - Each phase reads and writes one `RequestContext`, owned by the pipeline
//! - The gate is evaluated once per phase
//! - Nothing in the pipeline is fatal; bad input degrades to metrics and logs

pub mod context;
pub mod processor;
pub mod protocol;
pub mod request_body;
pub mod request_headers;
pub mod response_body;
pub mod response_headers;
pub mod session;
pub mod usage;

pub use context::{Identity, RequestContext, RoutingDecision};
pub use processor::{Processor, RequestPipeline};
pub use protocol::{
    BodyMode, HeaderEntry, HeaderLookup, HeaderMap, Phase, PhaseEvent, ProcessingResponse,
    ResponseStatus,
};
pub use request_body::{DecisionEngine, ModelEchoEngine, RouteRequest};
pub use request_headers::extract_identity;
pub use session::{run_session, Session};
