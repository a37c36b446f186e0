//! Local emulator of the compute metadata endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//! claims file (JSON)        CLI flags
//!        │                      │
//!        ▼                      ▼
//!   ┌─────────┐          ┌────────────┐
//!   │ config  │─────────▶│ validation │  strategy flags → one Strategy
//!   └─────────┘          └─────┬──────┘
//!                              │
//!                              ▼
//!                       ┌─────────────┐
//!                       │ credentials │  one of four acquisition modes →
//!                       │  resolver   │  exactly one ResolvedCredential
//!                       └─────┬───────┘
//!                             │ advisory cross-check (warnings only)
//!                             ▼
//!                       ┌─────────────┐        ┌──────────────────┐
//!                       │  lifecycle  │───────▶│  metadata server │
//!                       │orchestrator │ start/ │  (axum, tokens)  │
//!                       └─────────────┘ stop   └──────────────────┘
//!                             ▲
//!                             │ SIGINT / SIGTERM
//! ```

// Core subsystems
pub mod config;
pub mod credentials;
pub mod server;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{Claims, EmulatorConfig};
pub use credentials::{ResolvedCredential, Strategy};
pub use lifecycle::Orchestrator;
pub use server::MetadataServer;
