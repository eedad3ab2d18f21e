use std::sync::Arc;

use remedy_cluster::ClusterClient;
use remedy_core::ClusterId;
use remedy_executor::{ExecutorConfig, StepExecutor};
use remedy_notify::{ChatNotifier, LogNotifier, WebhookNotifier};
use remedy_store::RemediationStore;

use crate::config::EngineConfig;
use crate::engine::{EngineParts, RemediationEngine};
use crate::error::EngineError;

/// Builder for constructing a [`RemediationEngine`] with the required
/// dependencies.
///
/// A store is required. Notifiers default to [`LogNotifier`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    executor_config: ExecutorConfig,
    store: Option<Arc<dyn RemediationStore>>,
    chat: Option<Arc<dyn ChatNotifier>>,
    webhook: Option<Arc<dyn WebhookNotifier>>,
    clusters: Vec<(ClusterId, Arc<dyn ClusterClient>)>,
}

impl EngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    /// Set the rule and action store (required).
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RemediationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the transport for `notify` steps and approval prompts.
    #[must_use]
    pub fn chat_notifier(mut self, chat: Arc<dyn ChatNotifier>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Set the transport for `webhook` steps.
    #[must_use]
    pub fn webhook_notifier(mut self, webhook: Arc<dyn WebhookNotifier>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Register a cluster client up front. More can be added on the built
    /// engine.
    #[must_use]
    pub fn cluster_client(
        mut self,
        cluster_id: impl Into<ClusterId>,
        client: Arc<dyn ClusterClient>,
    ) -> Self {
        self.clusters.push((cluster_id.into(), client));
        self
    }

    /// Consume the builder and produce an engine. Call
    /// [`RemediationEngine::start`] to begin processing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if no store was set or the
    /// worker or queue sizes are zero.
    pub fn build(self) -> Result<RemediationEngine, EngineError> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Configuration("store is required".into()))?;
        if self.config.max_concurrent_actions == 0 {
            return Err(EngineError::Configuration(
                "max_concurrent_actions must be at least 1".into(),
            ));
        }
        if self.config.queue_capacity == 0 {
            return Err(EngineError::Configuration(
                "queue_capacity must be at least 1".into(),
            ));
        }

        let log: Arc<LogNotifier> = Arc::new(LogNotifier);
        Ok(RemediationEngine::from_parts(EngineParts {
            config: self.config,
            store,
            executor: StepExecutor::new(self.executor_config),
            chat: self.chat.unwrap_or_else(|| Arc::clone(&log) as Arc<dyn ChatNotifier>),
            webhook: self.webhook.unwrap_or_else(|| log as Arc<dyn WebhookNotifier>),
            clusters: self.clusters,
        }))
    }
}

#[cfg(test)]
mod tests {
    use remedy_store_memory::MemoryStore;

    use super::*;

    #[test]
    fn store_is_required() {
        let err = EngineBuilder::new().build().err().unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = EngineBuilder::new()
            .store(Arc::new(MemoryStore::new()))
            .config(EngineConfig {
                max_concurrent_actions: 0,
                ..EngineConfig::default()
            })
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("max_concurrent_actions"));
    }

    #[test]
    fn registers_initial_clusters() {
        let engine = EngineBuilder::new()
            .store(Arc::new(MemoryStore::new()))
            .cluster_client("prod", Arc::new(remedy_cluster::RecordingClusterClient::new()))
            .build()
            .unwrap();
        assert_eq!(engine.cluster_ids(), vec![ClusterId::new("prod")]);
    }
}
