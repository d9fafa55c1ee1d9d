//! Mode gate: "is this feature active" checks over a configuration snapshot.
//!
//! # Data Flow
//! ```text
//! FilterConfig (validated)
//!     → snapshot.rs (ModeGate::from_config, every default resolved once)
//!     → Arc<ModeGate> handed to each request at start
//!
//! Per phase:
//!     → plan.rs (HeaderPlan, one evaluation per response)
//!     → pricing.rs (model → per-million rates)
//! ```
//!
//! # Design Decisions
//! - Identity-scoped predicates collapse to false when identity mode is off
//! - Cost calculation is the one inverted default: on in standalone mode
//! - No ambient/global access; the snapshot is passed explicitly

pub mod plan;
pub mod pricing;
pub mod snapshot;

pub use plan::{HeaderNaming, HeaderPlan, RoutingSignal};
pub use pricing::{ModelPricing, PricingTable};
pub use snapshot::{CostPolicy, ModeGate};
