//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Identity header (request-header phase):
//!     → trust.rs (reject spoofing / injection patterns)
//!     → sanitize.rs (identity user / tier rules on top of label rules)
//!     → RequestContext identity fields
//!
//! Outgoing values:
//!     → sanitize.rs label rules   → metric labels
//!     → sanitize.rs header rules  → response headers
//! ```
//!
//! # Design Decisions
//! - Defense in depth: the upstream trust boundary is the primary control
//! - Fail soft: bad values collapse to fallbacks, never to errors
//! - No trust in header input, even from "trusted" sources

pub mod sanitize;
pub mod trust;

pub use sanitize::{
    sanitize_header, sanitize_identity_tier, sanitize_identity_user, sanitize_label, Sanitized,
};
pub use trust::{validate_trusted_header, TrustDecision, TrustRejection};
