use std::sync::Arc;

use remedy_cluster::ClusterClient;
use remedy_notify::{ChatNotifier, WebhookNotifier};

/// Collaborators a single action runs against.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Client for the action's cluster, if one is registered.
    pub cluster: Option<Arc<dyn ClusterClient>>,
    pub chat: Arc<dyn ChatNotifier>,
    pub webhook: Arc<dyn WebhookNotifier>,
}

impl ExecutionContext {
    pub fn new(chat: Arc<dyn ChatNotifier>, webhook: Arc<dyn WebhookNotifier>) -> Self {
        Self {
            cluster: None,
            chat,
            webhook,
        }
    }

    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }
}
