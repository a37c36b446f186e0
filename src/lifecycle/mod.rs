//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (orchestrator.rs):
//!     Constructed → start() → Running (or Failed, fatal)
//!
//! Shutdown (orchestrator.rs):
//!     Signal received → shutdown() → Stopped (or Failed, fatal)
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → satisfy the termination future, exactly once
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, the process exits non-zero
//! - Shutdown runs exactly once, only after a signal was observed
//! - Terminal states have no restart path

pub mod orchestrator;
pub mod signals;

pub use orchestrator::{LifecycleError, ManagedServer, Orchestrator, RunState};
pub use signals::shutdown_signal;
