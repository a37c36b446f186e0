//! Declared-identity claims loaded from the operator's JSON config file.
//!
//! The document mirrors the shape of the compute metadata tree it will be
//! served back out of (`computeMetadata/v1/...`), so wire names are
//! camelCase. Claims are advisory metadata: they describe the identity the
//! emulator serves to callers, not an enforced access boundary.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::validation::ConfigError;

/// Name of the service-account entry that must be present in every claims
/// document.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Root of the claims document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub compute_metadata: ComputeMetadata,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComputeMetadata {
    pub v1: MetadataV1,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataV1 {
    pub project: ProjectClaims,
    pub instance: InstanceClaims,
}

/// Declared project identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectClaims {
    /// The expected cloud project identifier.
    pub project_id: String,

    #[serde(default)]
    pub numeric_project_id: u64,
}

/// Declared instance identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceClaims {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub hostname: String,

    #[serde(default)]
    pub zone: String,

    /// Service accounts served by the emulator, keyed by account name.
    pub service_accounts: HashMap<String, ServiceAccountClaims>,
}

/// One declared service account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceAccountClaims {
    /// Service account email address.
    pub email: String,

    /// OAuth scopes granted to tokens issued for this account.
    pub scopes: Vec<String>,

    /// Alternate names this account answers to.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Claims {
    /// Load and parse a claims document from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let claims: Claims = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(claims)
    }

    /// The `"default"` service-account entry, if declared.
    pub fn default_service_account(&self) -> Option<&ServiceAccountClaims> {
        self.service_accounts().get(DEFAULT_SERVICE_ACCOUNT)
    }

    /// Look up a service account by name, alias, or email.
    pub fn service_account(&self, name: &str) -> Option<&ServiceAccountClaims> {
        let accounts = self.service_accounts();
        if let Some(account) = accounts.get(name) {
            return Some(account);
        }
        accounts
            .values()
            .find(|a| a.email == name || a.aliases.iter().any(|alias| alias == name))
    }

    /// All declared service accounts.
    pub fn service_accounts(&self) -> &HashMap<String, ServiceAccountClaims> {
        &self.compute_metadata.v1.instance.service_accounts
    }

    /// The declared project identifier.
    pub fn project_id(&self) -> &str {
        &self.compute_metadata.v1.project.project_id
    }
}
