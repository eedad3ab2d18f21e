//! Shared harness for the engine end-to-end suites.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use remedy_cluster::RecordingClusterClient;
use remedy_core::{ActionId, RemediationAction, RemediationEvent, RemediationRule, RuleId};
use remedy_engine::{EngineBuilder, EngineConfig, RemediationEngine};
use remedy_executor::{ExecutorConfig, RetryStrategy};
use remedy_notify::RecordingNotifier;
use remedy_store::{ActionPage, ActionQuery, RemediationStore, StoreError};
use remedy_store_memory::MemoryStore;

pub struct Harness {
    pub engine: RemediationEngine,
    pub store: Arc<MemoryStore>,
    pub cluster: Arc<RecordingClusterClient>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    /// Start an engine with the built-in rules and a `prod` cluster.
    pub async fn start() -> Self {
        Self::start_with(EngineConfig::default(), RecordingClusterClient::new()).await
    }

    pub async fn start_with(config: EngineConfig, cluster: RecordingClusterClient) -> Self {
        let harness = Self::build(config, cluster);
        harness.engine.start().await.unwrap();
        harness
    }

    /// Build without starting: no workers drain the queue.
    pub fn build(config: EngineConfig, cluster: RecordingClusterClient) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(cluster);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = EngineBuilder::new()
            .config(config)
            .executor_config(ExecutorConfig {
                retry_strategy: RetryStrategy::Constant {
                    delay: Duration::from_millis(5),
                },
                ..ExecutorConfig::default()
            })
            .store(Arc::clone(&store) as _)
            .chat_notifier(Arc::clone(&notifier) as _)
            .webhook_notifier(Arc::clone(&notifier) as _)
            .cluster_client("prod", Arc::clone(&cluster) as _)
            .build()
            .unwrap();
        Self {
            engine,
            store,
            cluster,
            notifier,
        }
    }

    /// Poll until the action reaches a terminal state.
    pub async fn wait_terminal(&self, id: &ActionId) -> RemediationAction {
        for _ in 0..500 {
            let action = self.engine.get_action(id).await.unwrap();
            if action.status.is_terminal() {
                return action;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("action {id} did not finish");
    }

    /// Poll until the rule has run `count` times.
    pub async fn wait_execution_count(&self, id: &str, count: u64) -> RemediationRule {
        let id = RuleId::new(id);
        for _ in 0..500 {
            let rule = self.engine.get_rule(&id).await.unwrap();
            if rule.execution_count >= count {
                return rule;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("rule {id} did not reach {count} executions");
    }

    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}

/// Engine config without the built-in rules.
pub fn bare_config() -> EngineConfig {
    EngineConfig {
        seed_builtin_rules: false,
        ..EngineConfig::default()
    }
}

pub fn backoff_event() -> RemediationEvent {
    RemediationEvent::new("Warning", "prod")
        .with_resource("Pod", "default", "app-1")
        .with_reason("BackOff")
        .with_severity("warning")
        .with_source("kubelet")
}

pub fn oom_event() -> RemediationEvent {
    RemediationEvent::new("Warning", "prod")
        .with_resource("Pod", "shop", "web-7f9c")
        .with_reason("OOMKilled")
        .with_label("app", "web")
}

/// A [`MemoryStore`] whose `save_action` can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemediationStore for FlakyStore {
    async fn load_enabled_rules(&self) -> Result<Vec<RemediationRule>, StoreError> {
        self.inner.load_enabled_rules().await
    }

    async fn save_rule(&self, rule: &RemediationRule) -> Result<(), StoreError> {
        self.inner.save_rule(rule).await
    }

    async fn delete_rule(&self, id: &RuleId) -> Result<bool, StoreError> {
        self.inner.delete_rule(id).await
    }

    async fn get_rule(&self, id: &RuleId) -> Result<Option<RemediationRule>, StoreError> {
        self.inner.get_rule(id).await
    }

    async fn list_rules(&self) -> Result<Vec<RemediationRule>, StoreError> {
        self.inner.list_rules().await
    }

    async fn save_action(&self, action: &RemediationAction) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store offline".into()));
        }
        self.inner.save_action(action).await
    }

    async fn get_action(&self, id: &ActionId) -> Result<Option<RemediationAction>, StoreError> {
        self.inner.get_action(id).await
    }

    async fn query_actions(&self, query: &ActionQuery) -> Result<ActionPage, StoreError> {
        self.inner.query_actions(query).await
    }
}
