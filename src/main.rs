//! Emulator entry point: resolve one credential, validate it against the
//! declared claims, then hand it to the lifecycle-managed metadata server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use metadata_emulator::config::{claims::Claims, schema::EmulatorConfig, validation};
use metadata_emulator::credentials::{self, validator};
use metadata_emulator::lifecycle::{self, Orchestrator};
use metadata_emulator::observability;
use metadata_emulator::server::MetadataServer;

#[derive(Parser, Debug)]
#[command(name = "metadata-emulator")]
#[command(about = "Local emulator of the compute metadata endpoint", long_about = None)]
struct Args {
    /// Interface address to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    interface: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Listen only on a unix domain socket at this path.
    #[arg(long)]
    domain_socket: Option<PathBuf>,

    /// Service account key file used by the default credential strategy.
    #[arg(long)]
    service_account_file: Option<PathBuf>,

    /// Claims configuration file declaring the served identity.
    #[arg(long, default_value = "config.json")]
    config_file: PathBuf,

    /// Impersonate the declared service account instead of using a key file.
    #[arg(long)]
    impersonate: bool,

    /// Use workload identity federation ambient credentials.
    #[arg(long)]
    federate: bool,

    /// Verify TPM reachability and defer token issuance to the hardware layer.
    #[arg(long)]
    tpm: bool,

    /// Path to the TPM character device.
    #[arg(long, default_value = "/dev/tpm0")]
    tpm_path: PathBuf,

    /// Persistent handle holding the TPM-resident key.
    #[arg(long, default_value_t = 0x8100_8000)]
    persistent_handle: u32,

    /// Expose Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Args {
    fn into_config(self) -> EmulatorConfig {
        let mut config = EmulatorConfig {
            bind_interface: self.interface,
            port: self.port,
            domain_socket: self.domain_socket,
            service_account_file: self.service_account_file,
            claims_file: self.config_file,
            impersonate: self.impersonate,
            federate: self.federate,
            use_tpm: self.tpm,
            tpm_path: self.tpm_path,
            persistent_handle: self.persistent_handle,
            ..EmulatorConfig::default()
        };
        if let Some(address) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    observability::logging::init();
    tracing::info!("metadata-emulator starting");

    let config = args.into_config();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let claims = Claims::from_file(&config.claims_file)?;
    validation::validate_claims(&claims)?;
    let strategy = validation::resolve_strategy(&config)?;

    let credential = credentials::resolve(strategy, &config, &claims)?;

    for mismatch in validator::cross_check(&credential, &claims) {
        tracing::warn!(%mismatch, "Declared identity differs from resolved credentials");
    }

    let server = MetadataServer::new(config, Arc::new(credential), Arc::new(claims))?;
    let mut orchestrator = Orchestrator::new(server);
    orchestrator.run(lifecycle::shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
