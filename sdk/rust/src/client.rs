use reqwest::{Client, Response};
use serde::Deserialize;

/// Access token payload returned by the emulator's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// Thin client for the emulator's metadata surface.
///
/// Every request carries the `Metadata-Flavor: Google` header real
/// metadata callers are required to send.
pub struct MetadataClient {
    client: Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The served project id.
    pub async fn project_id(&self) -> Result<String, Box<dyn std::error::Error>> {
        self.get_text("/computeMetadata/v1/project/project-id").await
    }

    /// The email of the given service account.
    pub async fn email(&self, account: &str) -> Result<String, Box<dyn std::error::Error>> {
        self.get_text(&format!(
            "/computeMetadata/v1/instance/service-accounts/{account}/email"
        ))
        .await
    }

    /// The scopes granted to the given service account, one per line on the
    /// wire.
    pub async fn scopes(&self, account: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let body = self
            .get_text(&format!(
                "/computeMetadata/v1/instance/service-accounts/{account}/scopes"
            ))
            .await?;
        Ok(body.lines().map(str::to_string).collect())
    }

    /// Fetch an access token for the given service account.
    pub async fn token(&self, account: &str) -> Result<TokenInfo, Box<dyn std::error::Error>> {
        let res = self
            .get(&format!(
                "/computeMetadata/v1/instance/service-accounts/{account}/token"
            ))
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(format!("emulator returned {status}: {text}").into());
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
    }

    async fn get_text(&self, path: &str) -> Result<String, Box<dyn std::error::Error>> {
        let res = self.get(path).await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(format!("emulator returned {status}: {text}").into());
        }
        Ok(text)
    }
}
