//! Client SDK for the metadata emulator.

pub mod client;

pub use client::{MetadataClient, TokenInfo};
