use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ClusterId;

/// A discrete cluster event fed into the engine.
///
/// Events are ephemeral: the engine never persists them directly, but a copy
/// is captured on every action it creates so the run can be audited later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationEvent {
    /// Event type, e.g. `Warning` or `Normal` for Kubernetes events.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Component that emitted the event.
    #[serde(default)]
    pub source: String,

    /// Cluster the event originated from.
    pub cluster_id: ClusterId,

    /// Namespace of the involved resource; empty for cluster-scoped resources.
    #[serde(default)]
    pub namespace: String,

    /// Kind of the involved resource, e.g. `Pod` or `Node`.
    #[serde(default)]
    pub resource_type: String,

    /// Name of the involved resource.
    #[serde(default)]
    pub resource_name: String,

    /// Machine-readable reason, e.g. `BackOff` or `OOMKilled`.
    #[serde(default)]
    pub reason: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Free-form severity string.
    #[serde(default)]
    pub severity: String,

    /// Labels of the involved resource.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Arbitrary structured data attached by the event source.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,

    /// When the event was observed.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl RemediationEvent {
    /// Create an event of the given type for a cluster, stamped with the
    /// current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, cluster_id: impl Into<ClusterId>) -> Self {
        Self {
            event_type: event_type.into(),
            cluster_id: cluster_id.into(),
            timestamp: Utc::now(),
            ..Self::default()
        }
    }

    /// Set the involved resource.
    #[must_use]
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.resource_type = resource_type.into();
        self.namespace = namespace.into();
        self.resource_name = name.into();
        self
    }

    /// Set the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    /// Set the source component.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Add a resource label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Look up a filterable field by name.
    ///
    /// `reason`, `type` and `severity` resolve to the event's own fields; any
    /// other name is looked up in the data map and rendered as a string.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "reason" => Some(self.reason.clone()),
            "type" => Some(self.event_type.clone()),
            "severity" => Some(self.severity.clone()),
            other => self.data_str(other),
        }
    }

    /// Render a data entry as a string. Strings are returned without quotes;
    /// other JSON values use their compact JSON form.
    pub fn data_str(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
