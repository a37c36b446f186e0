//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; request ids flow through tower-http
//! - Metrics are cheap counters, exported only when the operator opts in
//! - Counter updates are unconditional; without an installed recorder
//!   they are no-ops

pub mod logging;
pub mod metrics;
