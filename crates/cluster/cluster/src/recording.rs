use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use remedy_core::ResourceKind;

use crate::client::{ClusterClient, NodeInfo, PodInfo};
use crate::error::ClusterError;

/// A call observed by [`RecordingClusterClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterCall {
    DeletePod {
        namespace: String,
        name: String,
        grace_period: Duration,
    },
    GetScale {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },
    SetScale {
        kind: ResourceKind,
        namespace: String,
        name: String,
        replicas: i32,
    },
    JsonPatch {
        kind: ResourceKind,
        namespace: String,
        name: String,
        path: String,
        value: serde_json::Value,
    },
    GetNode {
        name: String,
    },
    UpdateNode {
        name: String,
        unschedulable: bool,
    },
    ListPods {
        namespace: String,
        field_selector: Option<String>,
    },
    Exec {
        namespace: String,
        pod: String,
        container: Option<String>,
        command: Vec<String>,
    },
}

impl ClusterCall {
    /// Operation name, as used by the failure-injection helpers.
    pub fn op(&self) -> &'static str {
        match self {
            Self::DeletePod { .. } => "delete_pod",
            Self::GetScale { .. } => "get_scale",
            Self::SetScale { .. } => "set_scale",
            Self::JsonPatch { .. } => "json_patch",
            Self::GetNode { .. } => "get_node",
            Self::UpdateNode { .. } => "update_node",
            Self::ListPods { .. } => "list_pods",
            Self::Exec { .. } => "exec",
        }
    }

    fn target(&self) -> &str {
        match self {
            Self::DeletePod { name, .. }
            | Self::GetScale { name, .. }
            | Self::SetScale { name, .. }
            | Self::JsonPatch { name, .. }
            | Self::GetNode { name }
            | Self::UpdateNode { name, .. } => name,
            Self::ListPods { namespace, .. } => namespace,
            Self::Exec { pod, .. } => pod,
        }
    }
}

#[derive(Debug, Default)]
struct Cluster {
    nodes: BTreeMap<String, NodeInfo>,
    pods: Vec<PodInfo>,
    scales: HashMap<(ResourceKind, String, String), i32>,
    exec_output: String,
}

#[derive(Debug, Default)]
struct Failures {
    /// Remaining injected failures per operation.
    counted: HashMap<&'static str, usize>,
    /// Operations that always fail for a given target name.
    targeted: Vec<(&'static str, String)>,
}

/// In-memory cluster that records every call.
///
/// Used by tests and by the server's dry-cluster mode. Pods, nodes and scale
/// subresources can be seeded, and failures injected per operation.
#[derive(Debug, Default)]
pub struct RecordingClusterClient {
    calls: Mutex<Vec<ClusterCall>>,
    cluster: Mutex<Cluster>,
    failures: Mutex<Failures>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_node(self, node: NodeInfo) -> Self {
        self.cluster.lock().nodes.insert(node.name.clone(), node);
        self
    }

    #[must_use]
    pub fn with_pod(self, pod: PodInfo) -> Self {
        self.cluster.lock().pods.push(pod);
        self
    }

    #[must_use]
    pub fn with_scale(
        self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Self {
        self.cluster
            .lock()
            .scales
            .insert((kind, namespace.to_owned(), name.to_owned()), replicas);
        self
    }

    #[must_use]
    pub fn with_exec_output(self, output: impl Into<String>) -> Self {
        self.cluster.lock().exec_output = output.into();
        self
    }

    /// Make the next `times` calls of `op` fail with a retryable API error.
    pub fn fail_times(&self, op: &'static str, times: usize) {
        self.failures.lock().counted.insert(op, times);
    }

    /// Make every call of `op` on `target` fail.
    pub fn fail_target(&self, op: &'static str, target: impl Into<String>) {
        self.failures.lock().targeted.push((op, target.into()));
    }

    /// Snapshot of all calls so far.
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().clone()
    }

    /// Calls of a single operation.
    pub fn calls_of(&self, op: &str) -> Vec<ClusterCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Calls that changed cluster state (everything except reads).
    pub fn mutations(&self) -> Vec<ClusterCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| {
                !matches!(
                    c,
                    ClusterCall::GetScale { .. }
                        | ClusterCall::GetNode { .. }
                        | ClusterCall::ListPods { .. }
                )
            })
            .cloned()
            .collect()
    }

    pub fn node(&self, name: &str) -> Option<NodeInfo> {
        self.cluster.lock().nodes.get(name).cloned()
    }

    pub fn pods(&self) -> Vec<PodInfo> {
        self.cluster.lock().pods.clone()
    }

    pub fn scale(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<i32> {
        self.cluster
            .lock()
            .scales
            .get(&(kind, namespace.to_owned(), name.to_owned()))
            .copied()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Record a call, apply the configured delay and any injected failure.
    async fn enter(&self, call: ClusterCall) -> Result<(), ClusterError> {
        let op = call.op();
        let target = call.target().to_owned();
        self.calls.lock().push(call);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut failures = self.failures.lock();
        if failures
            .targeted
            .iter()
            .any(|(o, t)| *o == op && *t == target)
        {
            return Err(ClusterError::Api {
                code: 500,
                message: format!("injected {op} failure for {target}"),
            });
        }
        if let Some(remaining) = failures.counted.get_mut(op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ClusterError::Api {
                code: 503,
                message: format!("injected {op} failure"),
            });
        }
        Ok(())
    }
}

fn node_from_selector(selector: Option<&str>) -> Option<&str> {
    selector?.strip_prefix("spec.nodeName=")
}

#[async_trait]
impl ClusterClient for RecordingClusterClient {
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Duration,
    ) -> Result<(), ClusterError> {
        self.enter(ClusterCall::DeletePod {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            grace_period,
        })
        .await?;
        self.cluster
            .lock()
            .pods
            .retain(|p| !(p.namespace == namespace && p.name == name));
        Ok(())
    }

    async fn get_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError> {
        self.enter(ClusterCall::GetScale {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
        .await?;
        self.scale(kind, namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("{kind} {namespace}/{name}")))
    }

    async fn set_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        self.enter(ClusterCall::SetScale {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            replicas,
        })
        .await?;
        self.cluster
            .lock()
            .scales
            .insert((kind, namespace.to_owned(), name.to_owned()), replicas);
        Ok(())
    }

    async fn json_patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        self.enter(ClusterCall::JsonPatch {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            path: path.to_owned(),
            value: value.clone(),
        })
        .await
    }

    async fn get_node(&self, name: &str) -> Result<NodeInfo, ClusterError> {
        self.enter(ClusterCall::GetNode {
            name: name.to_owned(),
        })
        .await?;
        self.node(name)
            .ok_or_else(|| ClusterError::NotFound(format!("node {name}")))
    }

    async fn update_node(&self, node: &NodeInfo) -> Result<(), ClusterError> {
        self.enter(ClusterCall::UpdateNode {
            name: node.name.clone(),
            unschedulable: node.unschedulable,
        })
        .await?;
        self.cluster
            .lock()
            .nodes
            .insert(node.name.clone(), node.clone());
        Ok(())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        self.enter(ClusterCall::ListPods {
            namespace: namespace.to_owned(),
            field_selector: field_selector.map(str::to_owned),
        })
        .await?;
        let node = node_from_selector(field_selector);
        Ok(self
            .cluster
            .lock()
            .pods
            .iter()
            .filter(|p| namespace.is_empty() || p.namespace == namespace)
            .filter(|p| node.is_none_or(|n| p.node_name.as_deref() == Some(n)))
            .cloned()
            .collect())
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<String, ClusterError> {
        self.enter(ClusterCall::Exec {
            namespace: namespace.to_owned(),
            pod: pod.to_owned(),
            container: container.map(str::to_owned),
            command: command.to_vec(),
        })
        .await?;
        Ok(self.cluster.lock().exec_output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_updates_state() {
        let client = RecordingClusterClient::new()
            .with_node(NodeInfo::new("worker-1"))
            .with_pod(PodInfo::new("shop", "web-1").on_node("worker-1"))
            .with_pod(PodInfo::new("shop", "web-2").on_node("worker-2"));

        let on_node = client.list_pods_on_node("worker-1").await.unwrap();
        assert_eq!(on_node.len(), 1);
        assert_eq!(on_node[0].name, "web-1");

        client
            .delete_pod("shop", "web-1", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(client.pods().len(), 1);

        let mut node = client.get_node("worker-1").await.unwrap();
        node.unschedulable = true;
        client.update_node(&node).await.unwrap();
        assert!(client.node("worker-1").unwrap().unschedulable);

        assert_eq!(client.calls().len(), 4);
        assert_eq!(client.mutations().len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let client = RecordingClusterClient::new();
        client.fail_times("delete_pod", 2);

        assert!(client.delete_pod("a", "p", Duration::ZERO).await.is_err());
        assert!(client.delete_pod("a", "p", Duration::ZERO).await.is_err());
        assert!(client.delete_pod("a", "p", Duration::ZERO).await.is_ok());
        assert_eq!(client.calls_of("delete_pod").len(), 3);
    }

    #[tokio::test]
    async fn targeted_failures_only_hit_target() {
        let client = RecordingClusterClient::new();
        client.fail_target("delete_pod", "stuck");

        assert!(client.delete_pod("a", "stuck", Duration::ZERO).await.is_err());
        assert!(client.delete_pod("a", "fine", Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn missing_resources_are_not_found() {
        let client = RecordingClusterClient::new();
        assert!(matches!(
            client.get_node("ghost").await,
            Err(ClusterError::NotFound(_))
        ));
        assert!(matches!(
            client.get_scale(ResourceKind::Deployment, "a", "b").await,
            Err(ClusterError::NotFound(_))
        ));
    }
}
