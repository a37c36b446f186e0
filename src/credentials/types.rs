//! Credential types and error definitions.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::credentials::token::{AccessToken, TokenSource};

/// Credential acquisition strategy, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Parse a service-account key file into a credential.
    ServiceAccountFile,
    /// Impersonate the declared service account.
    Impersonation,
    /// Discover workload identity federation ambient credentials.
    Federation,
    /// Prove TPM reachability; token derivation is downstream.
    Tpm,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ServiceAccountFile => "service-account-file",
            Strategy::Impersonation => "impersonation",
            Strategy::Federation => "federation",
            Strategy::Tpm => "tpm",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed identity data embedded in file-based credentials.
///
/// Only the key-file strategy exposes one; absence is a valid state for the
/// other strategies, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub client_email: String,
    pub project_id: String,
}

/// The single credential handle produced by the resolver.
///
/// Created once at startup and immutable afterwards; downstream consumers
/// share it by reference.
pub struct ResolvedCredential {
    strategy: Strategy,
    source: Option<Arc<dyn TokenSource>>,
    descriptor: Option<KeyDescriptor>,
}

impl ResolvedCredential {
    pub fn new(
        strategy: Strategy,
        source: Option<Arc<dyn TokenSource>>,
        descriptor: Option<KeyDescriptor>,
    ) -> Self {
        Self {
            strategy,
            source,
            descriptor,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn descriptor(&self) -> Option<&KeyDescriptor> {
        self.descriptor.as_ref()
    }

    /// Issue a bearer token from the underlying source.
    ///
    /// TPM-backed credentials carry no source here; issuance for them is
    /// owned by the hardware token layer.
    pub async fn token(&self) -> Result<AccessToken, CredentialError> {
        match &self.source {
            Some(source) => source.token().await,
            None => Err(CredentialError::TokenSourceUnavailable),
        }
    }
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("strategy", &self.strategy)
            .field("has_source", &self.source.is_some())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Errors that can occur while resolving or using credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Could not set up impersonation of the target principal.
    #[error("impersonation setup failed: {0}")]
    ImpersonationSetupFailed(String),

    /// The ambient-credential environment variable is not set.
    #[error("{0} must be set for federated credentials")]
    MissingAmbientCredentialConfig(&'static str),

    /// Ambient credentials exist but could not be loaded or classified.
    #[error("ambient credential discovery failed: {0}")]
    AmbientCredentialDiscoveryFailed(String),

    /// The TPM device could not be opened read/write.
    #[error("cannot open TPM device {path}: {source}")]
    DeviceOpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The TPM device handle did not close cleanly.
    #[error("cannot close TPM device {path}: {source}")]
    DeviceCloseFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The persistent handle is zero.
    #[error("persistent handle must be non-zero")]
    InvalidPersistentHandle,

    /// The service-account key file could not be read.
    #[error("cannot read service account file {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The service-account key file is not valid key material.
    #[error("cannot parse service account file: {0}")]
    FileParseFailed(String),

    /// A token exchange against the credential backend failed at runtime.
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// This credential carries no token source.
    #[error("no token source for this credential")]
    TokenSourceUnavailable,
}
