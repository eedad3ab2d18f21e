use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use remedy_core::ResourceKind;

use crate::error::ClusterError;

/// The subset of a node the engine reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub unschedulable: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// The subset of a pod the engine needs for draining.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub node_name: Option<String>,
    /// Kinds of the pod's owner references, e.g. `ReplicaSet`.
    #[serde(default)]
    pub owner_kinds: Vec<String>,
}

impl PodInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    #[must_use]
    pub fn owned_by(mut self, kind: impl Into<String>) -> Self {
        self.owner_kinds.push(kind.into());
        self
    }

    /// Whether a DaemonSet owns this pod. Drains leave these in place.
    pub fn is_daemonset_pod(&self) -> bool {
        self.owner_kinds.iter().any(|k| k == "DaemonSet")
    }
}

/// Capability handle for one cluster's control plane.
///
/// Implementations must be `Send + Sync`; the engine shares one handle per
/// cluster across all workers.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Delete a pod with the given grace period.
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Duration,
    ) -> Result<(), ClusterError>;

    /// Read the replica count from a workload's scale subresource.
    async fn get_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError>;

    /// Write the replica count to a workload's scale subresource.
    async fn set_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    /// Apply a single JSON-patch `replace` operation.
    async fn json_patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<(), ClusterError>;

    async fn get_node(&self, name: &str) -> Result<NodeInfo, ClusterError>;

    /// Persist the node's schedulability.
    async fn update_node(&self, node: &NodeInfo) -> Result<(), ClusterError>;

    /// List pods, optionally restricted to a namespace (empty means all) and
    /// a field selector such as `spec.nodeName=worker-1`.
    async fn list_pods(
        &self,
        namespace: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ClusterError>;

    /// List pods scheduled on a node, across all namespaces.
    async fn list_pods_on_node(&self, node: &str) -> Result<Vec<PodInfo>, ClusterError> {
        let selector = format!("spec.nodeName={node}");
        self.list_pods("", Some(&selector)).await
    }

    /// Run a command in a pod container and return its stdout.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<String, ClusterError>;
}
