//! Credential resolution subsystem.
//!
//! # Data Flow
//! ```text
//! EmulatorConfig + Claims
//!     → resolver.rs (one of four mutually exclusive strategies)
//!     → token.rs (strategy-specific token source)
//!     → ResolvedCredential (immutable, one per process lifetime)
//!     → validator.rs (advisory cross-check against the claims)
//!     → shared via Arc with the metadata server
//! ```
//!
//! # Design Decisions
//! - Exactly one strategy is active; selection happens once at startup
//! - Acquisition failures are fatal: no retry, no fallback chain
//! - Identity mismatches between key material and claims are warnings,
//!   never errors; the declared identity is advisory metadata
//! - The TPM path is a reachability probe only; token derivation belongs
//!   to the hardware token layer downstream

pub mod ambient;
pub mod key;
pub mod resolver;
pub mod token;
pub mod types;
pub mod validator;

pub use key::ServiceAccountKey;
pub use resolver::resolve;
pub use token::{AccessToken, TokenSource};
pub use types::{CredentialError, KeyDescriptor, ResolvedCredential, Strategy};
pub use validator::{cross_check, IdentityMismatch};
