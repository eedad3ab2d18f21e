use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::NotifyError;
use crate::message::WebhookPayload;
use crate::notifier::WebhookNotifier;

/// POSTs webhook payloads as JSON with `reqwest`.
pub struct HttpWebhookNotifier {
    client: Client,
    /// Sent with every request. Step headers override these.
    headers: BTreeMap<String, String>,
}

impl HttpWebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn merged_headers<'a>(
        &'a self,
        step_headers: &'a BTreeMap<String, String>,
    ) -> BTreeMap<&'a str, &'a str> {
        self.headers
            .iter()
            .chain(step_headers)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    #[instrument(skip(self, headers, payload), fields(action_id = %payload.action_id))]
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), NotifyError> {
        debug!(url, "dispatching webhook");

        let mut request = self.client.post(url).json(payload);
        for (key, value) in self.merged_headers(headers) {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if status == 429 {
            warn!(url, "webhook endpoint returned 429");
            return Err(NotifyError::RateLimited);
        }
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::UnexpectedStatus { status, body });
        }
        Ok(())
    }
}
