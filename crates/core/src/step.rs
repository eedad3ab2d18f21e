use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::RemediationEvent;

/// Kinds of cluster resources a step can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    Node,
    #[serde(alias = "pvc")]
    PersistentVolumeClaim,
}

impl ResourceKind {
    /// Canonical Kubernetes kind name, e.g. `StatefulSet`.
    pub fn kind_name(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Node => "Node",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
        }
    }

    /// Parse a kind from an event's resource type. Matching is
    /// case-insensitive and accepts plural and short forms.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "pod" | "pods" | "po" => Some(Self::Pod),
            "deployment" | "deployments" | "deploy" => Some(Self::Deployment),
            "statefulset" | "statefulsets" | "sts" => Some(Self::StatefulSet),
            "daemonset" | "daemonsets" | "ds" => Some(Self::DaemonSet),
            "node" | "nodes" | "no" => Some(Self::Node),
            "persistentvolumeclaim" | "persistentvolumeclaims" | "pvc" => {
                Some(Self::PersistentVolumeClaim)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// Where a step finds the resource it operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum StepTarget {
    /// The resource the triggering event is about.
    #[default]
    Event,
    /// A fixed resource. The namespace falls back to the event's.
    Named {
        kind: ResourceKind,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    /// A resource of `kind` whose name is the value of an event label,
    /// e.g. the owning deployment named by the `app` label of a pod.
    Label { kind: ResourceKind, label: String },
}

/// A target resolved against a concrete event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub resource_type: String,
    pub namespace: String,
    pub name: String,
}

impl ResolvedTarget {
    /// The typed kind, if the resource type is one the engine knows.
    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_kind(&self.resource_type)
    }
}

impl StepTarget {
    /// Resolve this target against an event. Returns `None` when the event
    /// does not carry enough information (no resource name, missing label).
    pub fn resolve(&self, event: &RemediationEvent) -> Option<ResolvedTarget> {
        match self {
            Self::Event => {
                if event.resource_name.is_empty() {
                    return None;
                }
                Some(ResolvedTarget {
                    resource_type: event.resource_type.clone(),
                    namespace: event.namespace.clone(),
                    name: event.resource_name.clone(),
                })
            }
            Self::Named {
                kind,
                name,
                namespace,
            } => Some(ResolvedTarget {
                resource_type: kind.kind_name().to_owned(),
                namespace: namespace.clone().unwrap_or_else(|| event.namespace.clone()),
                name: name.clone(),
            }),
            Self::Label { kind, label } => {
                event.labels.get(label).map(|name| ResolvedTarget {
                    resource_type: kind.kind_name().to_owned(),
                    namespace: event.namespace.clone(),
                    name: name.clone(),
                })
            }
        }
    }
}

/// Typed parameters of a single action step, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Delete a pod so its controller recreates it.
    RestartPod {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grace_period_seconds: Option<u32>,
    },
    /// Delete a resource. Only pods are supported.
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grace_period_seconds: Option<u32>,
    },
    /// Overwrite the replica count of a scalable workload.
    Scale { replicas: i32 },
    /// Apply a JSON-patch `replace` at `path`.
    Patch {
        path: String,
        value: serde_json::Value,
    },
    /// Mark a node unschedulable.
    Cordon,
    /// Cordon a node and evict its non-DaemonSet pods.
    Drain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grace_period_seconds: Option<u32>,
    },
    /// Run a command inside a pod container.
    Exec {
        command: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },
    /// Send a chat message.
    Notify {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// POST a structured payload to a URL.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

impl StepKind {
    /// The discriminant of this step.
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::RestartPod { .. } => ActionType::RestartPod,
            Self::Delete { .. } => ActionType::Delete,
            Self::Scale { .. } => ActionType::Scale,
            Self::Patch { .. } => ActionType::Patch,
            Self::Cordon => ActionType::Cordon,
            Self::Drain { .. } => ActionType::Drain,
            Self::Exec { .. } => ActionType::Exec,
            Self::Notify { .. } => ActionType::Notify,
            Self::Webhook { .. } => ActionType::Webhook,
        }
    }

    /// Whether the step needs a cluster client to run.
    pub fn needs_cluster(&self) -> bool {
        !matches!(self, Self::Notify { .. } | Self::Webhook { .. })
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Scale { replicas } if *replicas < 0 => {
                Err(format!("replicas must be non-negative, got {replicas}"))
            }
            Self::Patch { path, .. } if !path.starts_with('/') => {
                Err(format!("patch path must be a JSON pointer, got {path:?}"))
            }
            Self::Exec { command, .. } if command.is_empty() => {
                Err("exec command must not be empty".to_owned())
            }
            Self::Webhook { url, .. }
                if !(url.starts_with("http://") || url.starts_with("https://")) =>
            {
                Err(format!("webhook url must be http(s), got {url:?}"))
            }
            _ => Ok(()),
        }
    }
}

/// Closed set of action types, one per [`StepKind`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RestartPod,
    Delete,
    Scale,
    Patch,
    Cordon,
    Drain,
    Exec,
    Notify,
    Webhook,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RestartPod => "restart_pod",
            Self::Delete => "delete",
            Self::Scale => "scale",
            Self::Patch => "patch",
            Self::Cordon => "cordon",
            Self::Drain => "drain",
            Self::Exec => "exec",
            Self::Notify => "notify",
            Self::Webhook => "webhook",
        }
    }

    /// Parse the wire name of an action type.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::RestartPod,
            Self::Delete,
            Self::Scale,
            Self::Patch,
            Self::Cordon,
            Self::Drain,
            Self::Exec,
            Self::Notify,
            Self::Webhook,
        ]
        .into_iter()
        .find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a step errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole action and skip the remaining steps.
    #[default]
    Abort,
    /// Re-attempt the step up to `max_retries` times, then fail.
    Retry,
    /// Record the error and move on to the next step.
    Continue,
}

/// One step of a rule's action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    /// Execution order; lower runs first.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub target: StepTarget,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl ActionStep {
    /// Create a step targeting the event's resource with the default
    /// `abort` policy.
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self {
            order: 0,
            target: StepTarget::Event,
            on_failure: FailurePolicy::Abort,
            max_retries: 0,
            kind,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: StepTarget) -> Self {
        self.target = target;
        self
    }

    /// Use the `continue` policy.
    #[must_use]
    pub fn continue_on_failure(mut self) -> Self {
        self.on_failure = FailurePolicy::Continue;
        self
    }

    /// Use the `retry` policy with the given retry budget.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.on_failure = FailurePolicy::Retry;
        self.max_retries = max_retries;
        self
    }

    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }

    /// Validate the step's parameters. `index` is only used in the error.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        self.kind
            .validate()
            .map_err(|reason| ValidationError::InvalidStep { index, reason })?;
        if self.on_failure == FailurePolicy::Retry && self.max_retries == 0 {
            return Err(ValidationError::InvalidStep {
                index,
                reason: "retry policy requires max_retries > 0".to_owned(),
            });
        }
        if let StepTarget::Named { name, .. } = &self.target
            && name.is_empty()
        {
            return Err(ValidationError::InvalidStep {
                index,
                reason: "named target must have a name".to_owned(),
            });
        }
        Ok(())
    }
}

/// Return the steps ordered for execution: ascending `order`, ties broken by
/// declaration position.
pub fn ordered_steps(steps: &[ActionStep]) -> Vec<&ActionStep> {
    let mut ordered: Vec<&ActionStep> = steps.iter().collect();
    ordered.sort_by_key(|s| s.order);
    ordered
}
