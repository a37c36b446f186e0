//! Metadata HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP / unix socket connection
//!     → server.rs (Axum setup, flavor guard, routing)
//!     → claims (identity endpoints, served verbatim)
//!     → credential token source (token endpoint)
//!     → response with Metadata-Flavor / Server headers
//! ```

pub mod server;

pub use server::{MetadataServer, ServerError};
