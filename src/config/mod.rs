//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FilterConfig (validated, immutable)
//!     → gate::ModeGate::from_config (resolved once into a snapshot)
//!     → shared via Arc to every request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::FilterConfig;
pub use schema::IdentityBillingConfig;
pub use schema::ObservabilityConfig;
