use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::info;

use crate::error::NotifyError;
use crate::message::{ChatMessage, WebhookPayload};
use crate::notifier::{ChatNotifier, WebhookNotifier};

/// Writes notifications to the log instead of delivering them.
///
/// Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ChatNotifier for LogNotifier {
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError> {
        info!(
            channel = message.channel.as_deref().unwrap_or("-"),
            text = %message.text,
            "chat notification"
        );
        Ok(())
    }
}

#[async_trait]
impl WebhookNotifier for LogNotifier {
    async fn post(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), NotifyError> {
        info!(
            url,
            action_id = %payload.action_id,
            rule = %payload.rule_name,
            "webhook notification"
        );
        Ok(())
    }
}
