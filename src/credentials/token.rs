//! Token sources for the acquisition strategies.
//!
//! Each resolved credential wraps one of these; the metadata server calls
//! [`TokenSource::token`] on demand when a caller hits the token endpoint.
//! Sources are constructed at startup but perform no network I/O until the
//! first issuance.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::credentials::key::ServiceAccountKey;
use crate::credentials::types::CredentialError;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const IAM_CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com/v1";
const DEFAULT_STS_TOKEN_URL: &str = "https://sts.googleapis.com/v1/token";
const TOKEN_LIFETIME_SECS: u64 = 3600;

/// Bearer token material, serialized verbatim by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// A capability that produces bearer tokens on demand.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<AccessToken, CredentialError>;
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_expiry() -> u64 {
    TOKEN_LIFETIME_SECS
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

async fn parse_token_response(
    response: reqwest::Response,
) -> Result<AccessToken, CredentialError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;

    if !status.is_success() {
        return Err(CredentialError::TokenExchangeFailed(format!(
            "{status}: {body}"
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| CredentialError::TokenExchangeFailed(format!("invalid token response: {e}")))?;

    Ok(AccessToken {
        access_token: token.access_token,
        expires_in: token.expires_in,
        token_type: token.token_type,
    })
}

/// JWT-bearer grant backed by a service-account key file.
pub struct KeyFileTokenSource {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

impl KeyFileTokenSource {
    pub fn new(key: ServiceAccountKey, scopes: Vec<String>) -> Self {
        Self {
            key,
            scopes,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenSource for KeyFileTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let now = unix_now();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let signer = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| CredentialError::TokenExchangeFailed(format!("invalid private key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signer)
            .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;

        parse_token_response(response).await
    }
}

/// IAM-credentials `generateAccessToken` call on behalf of a target
/// principal, authorized by a wrapped source credential.
pub struct ImpersonatedTokenSource {
    scopes: Vec<String>,
    source: Arc<dyn TokenSource>,
    endpoint: Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenRequest<'a> {
    scope: &'a [String],
    lifetime: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
}

impl ImpersonatedTokenSource {
    pub fn new(
        target_principal: &str,
        scopes: Vec<String>,
        source: Arc<dyn TokenSource>,
    ) -> Result<Self, CredentialError> {
        let endpoint = Url::parse(&format!(
            "{IAM_CREDENTIALS_ENDPOINT}/projects/-/serviceAccounts/{target_principal}:generateAccessToken"
        ))
        .map_err(|e| {
            CredentialError::ImpersonationSetupFailed(format!(
                "invalid target principal {target_principal:?}: {e}"
            ))
        })?;

        Ok(Self {
            scopes,
            source,
            endpoint,
            http: reqwest::Client::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TokenSource for ImpersonatedTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let source_token = self.source.token().await?;

        let request = GenerateAccessTokenRequest {
            scope: &self.scopes,
            lifetime: format!("{TOKEN_LIFETIME_SECS}s"),
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&source_token.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(CredentialError::TokenExchangeFailed(format!(
                "{status}: {body}"
            )));
        }

        let token: GenerateAccessTokenResponse = serde_json::from_str(&body).map_err(|e| {
            CredentialError::TokenExchangeFailed(format!("invalid impersonation response: {e}"))
        })?;

        Ok(AccessToken {
            access_token: token.access_token,
            expires_in: TOKEN_LIFETIME_SECS,
            token_type: "Bearer".to_string(),
        })
    }
}

/// Workload identity federation: external-account configuration whose
/// subject token is exchanged at the STS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalAccountConfig {
    pub audience: String,

    pub subject_token_type: String,

    #[serde(default = "default_sts_token_url")]
    pub token_url: String,

    pub credential_source: CredentialSource,
}

fn default_sts_token_url() -> String {
    DEFAULT_STS_TOKEN_URL.to_string()
}

/// Where the subject token comes from. File-sourced tokens only.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSource {
    pub file: PathBuf,
}

/// STS token exchange for an external-account configuration.
pub struct FederatedTokenSource {
    config: ExternalAccountConfig,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl FederatedTokenSource {
    pub fn new(config: ExternalAccountConfig, scopes: Vec<String>) -> Self {
        Self {
            config,
            scopes,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenSource for FederatedTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let subject_token = tokio::fs::read_to_string(&self.config.credential_source.file)
            .await
            .map_err(|e| {
                CredentialError::TokenExchangeFailed(format!(
                    "cannot read subject token {}: {e}",
                    self.config.credential_source.file.display()
                ))
            })?;

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", TOKEN_EXCHANGE_GRANT),
                ("audience", self.config.audience.as_str()),
                ("scope", self.scopes.join(" ").as_str()),
                ("requested_token_type", ACCESS_TOKEN_TYPE),
                ("subject_token_type", self.config.subject_token_type.as_str()),
                ("subject_token", subject_token.trim()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::TokenExchangeFailed(e.to_string()))?;

        parse_token_response(response).await
    }
}
