//! Signed conversation URLs from the ElevenLabs REST API.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Issues short-lived, pre-authenticated WebSocket URLs for an agent conversation.
#[async_trait]
pub trait SignedUrlProvider: Send + Sync {
    /// Fetches a signed URL for `agent_id`. Failures are never retried.
    async fn fetch_signed_url(&self, api_key: &str, agent_id: &str)
    -> Result<String, ProviderError>;
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    signed_url: Option<String>,
}

/// `SignedUrlProvider` backed by the ElevenLabs `get_signed_url` endpoint.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_base: String,
}

impl ElevenLabsClient {
    pub const DEFAULT_API_BASE: &'static str = "https://api.elevenlabs.io";

    /// Creates a client against `api_base` (scheme and host, e.g. [`Self::DEFAULT_API_BASE`]).
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, agent_id: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ProviderError::Unavailable(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Unavailable("invalid API base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "convai", "conversation", "get_signed_url"]);
        url.query_pairs_mut().append_pair("agent_id", agent_id);
        Ok(url)
    }
}

#[async_trait]
impl SignedUrlProvider for ElevenLabsClient {
    async fn fetch_signed_url(
        &self,
        api_key: &str,
        agent_id: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(self.endpoint(agent_id)?)
            .header("xi-api-key", api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string());
            return Err(ProviderError::Unavailable(status_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let parsed: SignedUrlResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Protocol(e.to_string()))?;
        parsed
            .signed_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Protocol("response has no `signed_url`".to_string()))
    }
}
