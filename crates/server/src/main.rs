use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use remedy_cluster::{ClusterClient, RecordingClusterClient};
use remedy_cluster_kube::{EventWatcher, EventWatcherConfig, KubeClusterClient};
use remedy_core::{ClusterId, RemediationEvent};
use remedy_engine::{EngineBuilder, RemediationEngine, load_rules_from_dir};
use remedy_notify::{
    ChatNotifier, HttpWebhookNotifier, LogNotifier, SlackConfig, SlackNotifier, WebhookNotifier,
};
use remedy_server::api::AppState;
use remedy_server::config::{NotifyConfig, RemedyConfig, StoreBackend, StoreConfig};
use remedy_server::error::ServerError;
use remedy_store::RemediationStore;
use remedy_store_memory::MemoryStore;
use remedy_store_postgres::{PostgresStore, PostgresStoreConfig};

/// Capacity of the channel between cluster watchers and the engine.
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Remedy auto-remediation server.
#[derive(Parser, Debug)]
#[command(name = "remedy-server", about = "Rule-driven auto-remediation for Kubernetes")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "remedy.toml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Record cluster calls in memory instead of talking to Kubernetes.
    #[arg(long)]
    dry_cluster: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the store migrations, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }
    let config = RemedyConfig::load(&cli.config)?;

    if let Some(Commands::Migrate) = cli.command {
        create_store(&config.store).await?;
        info!(backend = ?config.store.backend, "store migrations complete");
        return Ok(());
    }

    let store = create_store(&config.store).await?;
    let (chat, webhook) = create_notifiers(&config.notify)?;

    let mut builder = EngineBuilder::new()
        .config(config.engine.to_engine_config())
        .executor_config(config.executor.to_executor_config())
        .store(store)
        .chat_notifier(chat)
        .webhook_notifier(webhook);

    // Watchers are started once the engine is running.
    let mut watchers = Vec::new();
    for cluster in &config.clusters {
        let id = ClusterId::new(cluster.id.clone());
        let client: Arc<dyn ClusterClient> = if cli.dry_cluster {
            Arc::new(RecordingClusterClient::new())
        } else {
            let kube = KubeClusterClient::from_context(cluster.context.as_deref())
                .await
                .map_err(|e| ServerError::Startup(format!("cluster {id}: {e}")))?;
            if cluster.watch_events {
                let watch = EventWatcherConfig::new(id.clone())
                    .with_namespaces(cluster.namespaces.clone());
                watchers.push(EventWatcher::new(kube.client(), watch));
            }
            Arc::new(kube)
        };
        info!(cluster = %id, dry = cli.dry_cluster, "cluster registered");
        builder = builder.cluster_client(id, client);
    }

    let engine = builder.build()?;
    engine.start().await?;

    if let Some(dir) = config.rules.directory.as_deref() {
        let rules = load_rules_from_dir(Path::new(dir))?;
        let loaded = engine.load_rules(rules).await?;
        info!(directory = dir, loaded, "rule files loaded");
    }

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    spawn_watchers(&engine, watchers, &tracker, &cancel);

    let app = remedy_server::api::router(AppState::new(engine.clone()));

    // CLI overrides take precedence.
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "remedy-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    tracker.close();
    tracker.wait().await;

    let timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for running actions..."
    );
    if tokio::time::timeout(timeout, engine.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, running actions were abandoned"
        );
    }

    info!("remedy-server shut down");
    Ok(())
}

async fn create_store(config: &StoreConfig) -> Result<Arc<dyn RemediationStore>, ServerError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Postgres => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("store.url is required for the postgres backend".to_owned())
            })?;
            let mut pg = PostgresStoreConfig::new(url);
            if let Some(prefix) = &config.prefix {
                pg = pg.with_prefix(prefix.clone());
            }
            let store = PostgresStore::new(&pg)
                .await
                .map_err(|e| ServerError::Startup(e.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

type Notifiers = (Arc<dyn ChatNotifier>, Arc<dyn WebhookNotifier>);

fn create_notifiers(config: &NotifyConfig) -> Result<Notifiers, ServerError> {
    let chat: Arc<dyn ChatNotifier> = match &config.slack {
        Some(slack) => {
            let mut cfg = SlackConfig::new(slack.token.clone());
            if let Some(channel) = &slack.channel {
                cfg = cfg.with_default_channel(channel.clone());
            }
            Arc::new(SlackNotifier::new(cfg).map_err(|e| ServerError::Startup(e.to_string()))?)
        }
        None => Arc::new(LogNotifier),
    };

    let webhook: Arc<dyn WebhookNotifier> = match &config.webhook {
        Some(section) => {
            let mut notifier =
                HttpWebhookNotifier::new(Duration::from_secs(section.timeout_seconds))
                    .map_err(|e| ServerError::Startup(e.to_string()))?;
            for (key, value) in &section.headers {
                notifier = notifier.with_header(key.clone(), value.clone());
            }
            Arc::new(notifier)
        }
        None => Arc::new(LogNotifier),
    };

    Ok((chat, webhook))
}

/// Run every watcher into one channel and feed the engine from it.
fn spawn_watchers(
    engine: &RemediationEngine,
    watchers: Vec<EventWatcher>,
    tracker: &TaskTracker,
    cancel: &CancellationToken,
) {
    if watchers.is_empty() {
        return;
    }
    let (tx, mut rx) = mpsc::channel::<RemediationEvent>(WATCH_CHANNEL_CAPACITY);
    for watcher in watchers {
        tracker.spawn(watcher.run(tx.clone(), cancel.clone()));
    }
    drop(tx);

    let engine = engine.clone();
    tracker.spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = engine.process_event(event).await {
                warn!(error = %e, "event dropped");
            }
        }
    });
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
