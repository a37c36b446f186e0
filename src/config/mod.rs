//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags
//!     → schema.rs (EmulatorConfig, immutable snapshot)
//!
//! claims file (JSON)
//!     → claims.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Claims (validated, immutable)
//!     → shared via Arc with the metadata server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once constructed; no reload path
//! - Strategy flags are validated for mutual exclusivity up front,
//!   before any credential acquisition is attempted
//! - Validation separates syntactic (serde) from semantic checks

pub mod claims;
pub mod schema;
pub mod validation;

pub use claims::{Claims, ServiceAccountClaims};
pub use schema::{EmulatorConfig, ObservabilityConfig};
pub use validation::ConfigError;
