//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve the four strategy flags into a single `Strategy`, rejecting
//!   simultaneous activation instead of silently prioritizing
//! - Enforce the claims invariants (default entry present, scopes non-empty)
//!
//! # Design Decisions
//! - Validation is a set of pure functions over the config and claims
//! - Runs once at startup, before any credential acquisition

use thiserror::Error;

use crate::config::claims::Claims;
use crate::config::schema::EmulatorConfig;
use crate::credentials::Strategy;

/// Errors detected before any credential acquisition is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Claims file could not be read.
    #[error("cannot read claims file: {0}")]
    Io(#[source] std::io::Error),

    /// Claims file is not valid JSON for the expected shape.
    #[error("cannot parse claims file: {0}")]
    Parse(#[source] serde_json::Error),

    /// The `"default"` service-account entry is missing.
    #[error("claims must declare a \"default\" service account")]
    MissingDefaultServiceAccount,

    /// A declared service account has no scopes.
    #[error("service account {0:?} declares no scopes")]
    EmptyScopes(String),

    /// More than one credential strategy flag is active.
    #[error("strategy flags are mutually exclusive: {0}")]
    ConflictingStrategies(String),

    /// The default strategy needs a key file and none was given.
    #[error("no strategy flag set and no service account file configured")]
    MissingServiceAccountFile,
}

/// Resolve the strategy flags into exactly one [`Strategy`].
///
/// Simultaneous activation is rejected rather than prioritized; with no flag
/// set, the key-file strategy is selected and the key file must be
/// configured.
pub fn resolve_strategy(config: &EmulatorConfig) -> Result<Strategy, ConfigError> {
    let active: Vec<&str> = [
        (config.impersonate, "--impersonate"),
        (config.federate, "--federate"),
        (config.use_tpm, "--tpm"),
    ]
    .into_iter()
    .filter_map(|(on, flag)| on.then_some(flag))
    .collect();

    match active.as_slice() {
        [] => {
            if config.service_account_file.is_none() {
                return Err(ConfigError::MissingServiceAccountFile);
            }
            Ok(Strategy::ServiceAccountFile)
        }
        ["--impersonate"] => Ok(Strategy::Impersonation),
        ["--federate"] => Ok(Strategy::Federation),
        ["--tpm"] => Ok(Strategy::Tpm),
        conflicting => Err(ConfigError::ConflictingStrategies(conflicting.join(", "))),
    }
}

/// Check the claims invariants once, at startup.
pub fn validate_claims(claims: &Claims) -> Result<(), ConfigError> {
    claims
        .default_service_account()
        .ok_or(ConfigError::MissingDefaultServiceAccount)?;

    for (name, account) in claims.service_accounts() {
        if account.scopes.is_empty() {
            return Err(ConfigError::EmptyScopes(name.clone()));
        }
    }
    Ok(())
}
