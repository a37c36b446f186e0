//! Advisory cross-check between resolved credentials and declared claims.
//!
//! # Responsibilities
//! - Compare the key descriptor's identity against the claims
//! - Report mismatches as values; the caller decides how to log them
//!
//! # Design Decisions
//! - Pure function: credential + claims → list of mismatches
//! - Mismatches never block startup; the declared identity is advisory
//!   metadata served to callers, not an enforced access boundary
//! - Strategies without a descriptor produce no findings by design

use std::fmt;

use crate::config::claims::Claims;
use crate::credentials::types::ResolvedCredential;

/// A detected divergence between declared and resolved identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMismatch {
    ProjectId { declared: String, actual: String },
    Email { declared: String, actual: String },
}

impl fmt::Display for IdentityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMismatch::ProjectId { declared, actual } => write!(
                f,
                "declared project id [{declared}] does not match project from credentials [{actual}]"
            ),
            IdentityMismatch::Email { declared, actual } => write!(
                f,
                "declared service account email [{declared}] does not match email from credentials [{actual}]"
            ),
        }
    }
}

/// Compare the credential's embedded identity against the claims.
///
/// Returns an empty list whenever the credential carries no descriptor.
pub fn cross_check(credential: &ResolvedCredential, claims: &Claims) -> Vec<IdentityMismatch> {
    let mut mismatches = Vec::new();

    let Some(descriptor) = credential.descriptor() else {
        return mismatches;
    };

    if descriptor.project_id != claims.project_id() {
        mismatches.push(IdentityMismatch::ProjectId {
            declared: claims.project_id().to_string(),
            actual: descriptor.project_id.clone(),
        });
    }

    if let Some(account) = claims.default_service_account() {
        if descriptor.client_email != account.email {
            mismatches.push(IdentityMismatch::Email {
                declared: account.email.clone(),
                actual: descriptor.client_email.clone(),
            });
        }
    }

    mismatches
}
