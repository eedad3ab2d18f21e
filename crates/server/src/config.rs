use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use remedy_engine::EngineConfig;
use remedy_executor::{ExecutorConfig, RetryStrategy};

use crate::error::ServerError;

/// Top-level configuration for the Remedy server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct RemedyConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Engine behaviour: worker pool, queue, approvals.
    #[serde(default)]
    pub engine: EngineSection,
    /// Step executor timing.
    #[serde(default)]
    pub executor: ExecutorSection,
    /// Rule and action store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Rule file loading.
    #[serde(default)]
    pub rules: RulesConfig,
    /// Clusters to control and watch.
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
    /// Chat and webhook transports.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl RemedyConfig {
    /// Read the config file, falling back to the defaults when it does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }
}

// -- [server] ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds to wait for running actions on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

// -- [engine] ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_max_concurrent_actions")]
    pub max_concurrent_actions: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_cooldown_seconds")]
    pub default_cooldown_seconds: u64,
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub seed_builtin_rules: bool,
    #[serde(default = "default_schedule_tick")]
    pub schedule_tick_seconds: u64,
    /// Chat channel for approval prompts.
    #[serde(default)]
    pub approval_channel: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_concurrent_actions: default_max_concurrent_actions(),
            queue_capacity: default_queue_capacity(),
            default_cooldown_seconds: default_cooldown_seconds(),
            require_approval: false,
            dry_run: false,
            seed_builtin_rules: true,
            schedule_tick_seconds: default_schedule_tick(),
            approval_channel: None,
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_actions: self.max_concurrent_actions,
            queue_capacity: self.queue_capacity,
            default_cooldown: Duration::from_secs(self.default_cooldown_seconds),
            require_approval: self.require_approval,
            dry_run: self.dry_run,
            seed_builtin_rules: self.seed_builtin_rules,
            schedule_tick: Duration::from_secs(self.schedule_tick_seconds),
            approval_channel: self.approval_channel.clone(),
        }
    }
}

fn default_max_concurrent_actions() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_cooldown_seconds() -> u64 {
    300
}

fn default_schedule_tick() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

// -- [executor] -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExecutorSection {
    /// Base delay for linear retry backoff.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Optional ceiling for the retry backoff. Unset means uncapped.
    #[serde(default)]
    pub retry_max_ms: Option<u64>,
    /// Per-call timeout. Zero disables it.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
    #[serde(default = "default_restart_grace")]
    pub restart_grace_period_seconds: u64,
    #[serde(default)]
    pub delete_grace_period_seconds: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_ms: None,
            step_timeout_seconds: default_step_timeout(),
            restart_grace_period_seconds: default_restart_grace(),
            delete_grace_period_seconds: 0,
        }
    }
}

impl ExecutorSection {
    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            retry_strategy: RetryStrategy::Linear {
                delay: Duration::from_millis(self.retry_delay_ms),
                max: self.retry_max_ms.map_or(Duration::MAX, Duration::from_millis),
            },
            step_timeout: (self.step_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.step_timeout_seconds)),
            restart_grace_period: Duration::from_secs(self.restart_grace_period_seconds),
            delete_grace_period: Duration::from_secs(self.delete_grace_period_seconds),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_step_timeout() -> u64 {
    120
}

fn default_restart_grace() -> u64 {
    30
}

// -- [store] ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Connection URL, required for `postgres`.
    #[serde(default)]
    pub url: Option<String>,
    /// Table name prefix.
    #[serde(default)]
    pub prefix: Option<String>,
}

// -- [rules] ----------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RulesConfig {
    /// Directory of `.yaml`/`.yml`/`.toml` rule files loaded at startup.
    #[serde(default)]
    pub directory: Option<String>,
}

// -- [[clusters]] -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ClusterConfig {
    pub id: String,
    /// Kubeconfig context. `None` uses the inferred default.
    #[serde(default)]
    pub context: Option<String>,
    /// Stream the cluster's Events into the engine.
    #[serde(default = "default_true")]
    pub watch_events: bool,
    /// Namespaces to watch. Empty means all.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

// -- [notify] ---------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub slack: Option<SlackSection>,
    #[serde(default)]
    pub webhook: Option<WebhookSection>,
}

#[derive(Debug, Deserialize)]
pub struct SlackSection {
    pub token: String,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookSection {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
    /// Headers added to every webhook request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_webhook_timeout() -> u64 {
    10
}
