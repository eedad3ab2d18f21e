use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::NotifyError;
use crate::message::{ChatMessage, WebhookPayload};
use crate::notifier::{ChatNotifier, WebhookNotifier};

/// A webhook delivery captured by [`RecordingNotifier`].
#[derive(Debug, Clone)]
pub struct RecordedWebhook {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub payload: WebhookPayload,
}

/// Captures every notification in memory. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<ChatMessage>>,
    webhooks: Mutex<Vec<RecordedWebhook>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    pub fn webhooks(&self) -> Vec<RecordedWebhook> {
        self.webhooks.lock().clone()
    }

    fn check(&self) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::UnexpectedStatus {
                status: 503,
                body: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError> {
        self.check()?;
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl WebhookNotifier for RecordingNotifier {
    async fn post(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        payload: &WebhookPayload,
    ) -> Result<(), NotifyError> {
        self.check()?;
        self.webhooks.lock().push(RecordedWebhook {
            url: url.to_owned(),
            headers: headers.clone(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_messages() {
        let notifier = RecordingNotifier::new();
        notifier.send(&ChatMessage::new("one")).await.unwrap();
        notifier.send(&ChatMessage::new("two")).await.unwrap();
        let texts: Vec<String> = notifier.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn failing_mode_records_nothing() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let err = notifier.send(&ChatMessage::new("x")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(notifier.messages().is_empty());
    }
}
