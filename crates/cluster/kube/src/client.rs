use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod};
use kube::api::{Api, AttachParams, DeleteParams, ListParams, Patch, PatchParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use remedy_cluster::{ClusterClient, ClusterError, NodeInfo, PodInfo};
use remedy_core::ResourceKind;

use crate::convert::{node_info, pod_info};

/// [`ClusterClient`] backed by the Kubernetes API through `kube`.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the named kubeconfig context, or the inferred default
    /// (in-cluster service account or current context) when `None`.
    pub async fn from_context(context: Option<&str>) -> Result<Self, ClusterError> {
        let client = match context {
            Some(ctx) => {
                let options = KubeConfigOptions {
                    context: Some(ctx.to_owned()),
                    ..KubeConfigOptions::default()
                };
                let config = Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| ClusterError::Connection(e.to_string()))?;
                Client::try_from(config).map_err(|e| ClusterError::Connection(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| ClusterError::Connection(e.to_string()))?,
        };
        Ok(Self::new(client))
    }

    /// The underlying `kube` client, shared with the event watcher.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

fn map_err(e: kube::Error) -> ClusterError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(ae.message),
        kube::Error::Api(ae) => ClusterError::Api {
            code: ae.code,
            message: ae.message,
        },
        other => ClusterError::Connection(other.to_string()),
    }
}

async fn apply_patch<K>(api: Api<K>, name: &str, patch: &Patch<()>) -> Result<(), ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.patch(name, &PatchParams::default(), patch)
        .await
        .map(|_| ())
        .map_err(map_err)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    #[instrument(skip(self))]
    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period: Duration,
    ) -> Result<(), ClusterError> {
        let params = DeleteParams {
            grace_period_seconds: Some(u32::try_from(grace_period.as_secs()).unwrap_or(u32::MAX)),
            ..DeleteParams::default()
        };
        self.pods(namespace)
            .delete(name, &params)
            .await
            .map_err(map_err)?;
        debug!("pod deleted");
        Ok(())
    }

    async fn get_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError> {
        let scale = match kind {
            ResourceKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), namespace)
                    .get_scale(name)
                    .await
            }
            ResourceKind::StatefulSet => {
                Api::<StatefulSet>::namespaced(self.client.clone(), namespace)
                    .get_scale(name)
                    .await
            }
            other => {
                return Err(ClusterError::Unsupported(format!(
                    "{} has no scale subresource",
                    other.kind_name()
                )));
            }
        }
        .map_err(map_err)?;

        Ok(scale.spec.and_then(|s| s.replicas).unwrap_or(0))
    }

    #[instrument(skip(self))]
    async fn set_scale(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let patch = Patch::Merge(json!({ "spec": { "replicas": replicas } }));
        let params = PatchParams::default();
        match kind {
            ResourceKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), namespace)
                    .patch_scale(name, &params, &patch)
                    .await
            }
            ResourceKind::StatefulSet => {
                Api::<StatefulSet>::namespaced(self.client.clone(), namespace)
                    .patch_scale(name, &params, &patch)
                    .await
            }
            other => {
                return Err(ClusterError::Unsupported(format!(
                    "{} has no scale subresource",
                    other.kind_name()
                )));
            }
        }
        .map_err(map_err)?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn json_patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        let ops = json!([{ "op": "replace", "path": path, "value": value }]);
        let patch = Patch::<()>::Json(
            serde_json::from_value(ops).map_err(|e| ClusterError::Unsupported(e.to_string()))?,
        );
        let client = self.client.clone();

        match kind {
            ResourceKind::Pod => apply_patch(self.pods(namespace), name, &patch).await,
            ResourceKind::Deployment => {
                apply_patch(Api::<Deployment>::namespaced(client, namespace), name, &patch).await
            }
            ResourceKind::StatefulSet => {
                apply_patch(Api::<StatefulSet>::namespaced(client, namespace), name, &patch).await
            }
            ResourceKind::DaemonSet => {
                apply_patch(Api::<DaemonSet>::namespaced(client, namespace), name, &patch).await
            }
            ResourceKind::PersistentVolumeClaim => {
                apply_patch(
                    Api::<PersistentVolumeClaim>::namespaced(client, namespace),
                    name,
                    &patch,
                )
                .await
            }
            ResourceKind::Node => apply_patch(Api::<Node>::all(client), name, &patch).await,
        }
    }

    async fn get_node(&self, name: &str) -> Result<NodeInfo, ClusterError> {
        let node = Api::<Node>::all(self.client.clone())
            .get(name)
            .await
            .map_err(map_err)?;
        Ok(node_info(&node))
    }

    #[instrument(skip(self, node), fields(node = %node.name))]
    async fn update_node(&self, node: &NodeInfo) -> Result<(), ClusterError> {
        let patch = Patch::Merge(json!({ "spec": { "unschedulable": node.unschedulable } }));
        Api::<Node>::all(self.client.clone())
            .patch(&node.name, &PatchParams::default(), &patch)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        let mut params = ListParams::default();
        if let Some(selector) = field_selector {
            params = params.fields(selector);
        }
        let list = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(map_err)?;
        Ok(list.items.iter().map(pod_info).collect())
    }

    #[instrument(skip(self))]
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<String, ClusterError> {
        let mut params = AttachParams::default().stdout(true).stderr(false);
        if let Some(c) = container {
            params = params.container(c);
        }

        let mut process = Api::<Pod>::namespaced(self.client.clone(), namespace)
            .exec(pod, command.iter().map(String::as_str), &params)
            .await
            .map_err(map_err)?;

        let mut output = String::new();
        if let Some(mut stdout) = process.stdout() {
            stdout
                .read_to_string(&mut output)
                .await
                .map_err(|e| ClusterError::Connection(e.to_string()))?;
        }

        let status = match process.take_status() {
            Some(fut) => fut.await,
            None => None,
        };
        process
            .join()
            .await
            .map_err(|e| ClusterError::Connection(e.to_string()))?;

        if let Some(status) = status
            && status.status.as_deref() == Some("Failure")
        {
            return Err(ClusterError::Api {
                code: 500,
                message: status
                    .message
                    .unwrap_or_else(|| "command exited with failure".to_owned()),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("status {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn not_found_maps_to_not_found() {
        assert!(matches!(map_err(api_error(404)), ClusterError::NotFound(_)));
    }

    #[test]
    fn server_errors_stay_retryable() {
        let err = map_err(api_error(503));
        assert!(matches!(err, ClusterError::Api { code: 503, .. }));
        assert!(err.is_retryable());
        assert!(!map_err(api_error(403)).is_retryable());
    }
}
