use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::NotifyError;
use crate::message::ChatMessage;
use crate::notifier::ChatNotifier;

const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Connection settings for [`SlackNotifier`].
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub token: String,
    #[serde(default)]
    pub default_channel: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

impl SlackConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            default_channel: None,
            api_base_url: default_api_base_url(),
        }
    }

    #[must_use]
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &"[REDACTED]")
            .field("default_channel", &self.default_channel)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Sends chat messages through the Slack Web API (`chat.postMessage`).
pub struct SlackNotifier {
    config: SlackConfig,
    client: Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Use a caller-provided HTTP client, e.g. to share a connection pool.
    pub fn with_client(config: SlackConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn resolve_channel<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, NotifyError> {
        requested
            .or(self.config.default_channel.as_deref())
            .ok_or_else(|| {
                NotifyError::InvalidPayload(
                    "no channel on message and no default channel configured".into(),
                )
            })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.config.api_base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatNotifier for SlackNotifier {
    #[instrument(skip(self, message), fields(notifier = "slack"))]
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError> {
        let channel = self.resolve_channel(message.channel.as_deref())?;
        let request = PostMessageRequest {
            channel,
            text: &message.text,
        };

        debug!(channel, "posting message to Slack");
        let response = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Slack API rate limit hit");
            return Err(NotifyError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let api: ApiResponse = response.json().await?;
        if !api.ok {
            return Err(NotifyError::Api(
                api.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }
        Ok(())
    }
}
