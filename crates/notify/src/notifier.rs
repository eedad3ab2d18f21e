use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::message::{ChatMessage, WebhookPayload};

/// Delivers chat messages to humans, e.g. approval prompts.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError>;
}

/// Delivers structured payloads to HTTP endpoints.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    /// POST `payload` as JSON to `url`. `headers` are added on top of any
    /// headers the transport was configured with.
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), NotifyError>;
}
