use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A human-facing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Target channel. `None` uses the transport's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub text: String,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            channel: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// Body POSTed by `webhook` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub action_id: String,
    pub rule_name: String,
    pub resource_type: String,
    pub resource_name: String,
    pub namespace: String,
    pub cluster_id: String,
    /// The headline step's parameters as stored on the action.
    pub parameters: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_omits_missing_channel() {
        let json = serde_json::to_value(ChatMessage::new("hello")).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hello" }));

        let json = serde_json::to_value(ChatMessage::new("hi").with_channel("#ops")).unwrap();
        assert_eq!(json["channel"], "#ops");
    }

    #[test]
    fn webhook_payload_field_names() {
        let payload = WebhookPayload {
            action_id: "a-1".into(),
            rule_name: "crash-loop-restart".into(),
            resource_type: "Pod".into(),
            resource_name: "app-1".into(),
            namespace: "default".into(),
            cluster_id: "prod".into(),
            parameters: serde_json::json!({ "type": "restart_pod" }),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        for key in [
            "action_id",
            "rule_name",
            "resource_type",
            "resource_name",
            "namespace",
            "cluster_id",
            "parameters",
            "timestamp",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
