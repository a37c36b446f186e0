//! Configuration schema definitions.
//!
//! This module defines the runtime settings for the emulator process.
//! The snapshot is assembled once from CLI flags and passed by value
//! into the metadata server; no component reads flag state directly.

use std::path::PathBuf;

/// Root configuration for the metadata emulator.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Interface address to bind to (e.g., "127.0.0.1").
    pub bind_interface: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Listen only on a unix domain socket at this path, instead of TCP.
    pub domain_socket: Option<PathBuf>,

    /// Service account key file used by the default credential strategy.
    pub service_account_file: Option<PathBuf>,

    /// Claims configuration file declaring the served identity.
    pub claims_file: PathBuf,

    /// Impersonate the declared service account instead of using a key file.
    pub impersonate: bool,

    /// Use workload identity federation ambient credentials.
    pub federate: bool,

    /// Prove TPM reachability and defer token issuance to the hardware layer.
    pub use_tpm: bool,

    /// Path to the TPM character device.
    pub tpm_path: PathBuf,

    /// Persistent handle holding the TPM-resident key.
    pub persistent_handle: u32,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            bind_interface: "127.0.0.1".to_string(),
            port: 8080,
            domain_socket: None,
            service_account_file: None,
            claims_file: PathBuf::from("config.json"),
            impersonate: false,
            federate: false,
            use_tpm: false,
            tpm_path: PathBuf::from("/dev/tpm0"),
            persistent_handle: 0x8100_8000,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
