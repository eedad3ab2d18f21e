use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remedy_core::{ClusterId, RemediationEvent};

use crate::convert::event_from_kube;

/// What a watcher forwards into the engine.
#[derive(Debug, Clone)]
pub struct EventWatcherConfig {
    pub cluster_id: ClusterId,
    /// Namespaces to watch. Empty means all namespaces.
    pub namespaces: Vec<String>,
    /// Drop `Normal` events before they reach the engine.
    pub warnings_only: bool,
    /// Fetch the involved pod's labels so label-scoped targets resolve.
    pub enrich_labels: bool,
}

impl EventWatcherConfig {
    pub fn new(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            namespaces: Vec::new(),
            warnings_only: true,
            enrich_labels: true,
        }
    }

    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// Streams core/v1 Events from one cluster into an mpsc channel.
pub struct EventWatcher {
    client: Client,
    config: EventWatcherConfig,
}

impl EventWatcher {
    pub fn new(client: Client, config: EventWatcherConfig) -> Self {
        Self { client, config }
    }

    fn streams(&self) -> BoxStream<'static, Result<Event, watcher::Error>> {
        let apis: Vec<Api<Event>> = if self.config.namespaces.is_empty() {
            vec![Api::all(self.client.clone())]
        } else {
            self.config
                .namespaces
                .iter()
                .map(|ns| Api::namespaced(self.client.clone(), ns))
                .collect()
        };

        stream::select_all(apis.into_iter().map(|api| {
            watcher(api, watcher::Config::default())
                .default_backoff()
                .applied_objects()
                .boxed()
        }))
        .boxed()
    }

    /// Run until cancelled or until the receiving side is dropped.
    ///
    /// Events recorded before the watcher started are skipped, so the
    /// initial list does not replay history into the engine.
    pub async fn run(self, tx: mpsc::Sender<RemediationEvent>, cancel: CancellationToken) {
        let started = Utc::now();
        let mut events = self.streams();
        info!(cluster = %self.config.cluster_id, "event watcher started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(cluster = %self.config.cluster_id, "event watcher cancelled");
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(ev)) => {
                        let Some(event) = self.accept(&ev, started).await else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(cluster = %self.config.cluster_id, error = %e, "event watch error");
                    }
                    None => break,
                },
            }
        }

        info!(cluster = %self.config.cluster_id, "event watcher stopped");
    }

    async fn accept(&self, ev: &Event, started: DateTime<Utc>) -> Option<RemediationEvent> {
        let mut event = event_from_kube(&self.config.cluster_id, ev);
        if event.timestamp < started {
            return None;
        }
        if self.config.warnings_only && event.event_type != "Warning" {
            return None;
        }
        if self.config.enrich_labels
            && event.resource_type == "Pod"
            && !event.namespace.is_empty()
        {
            let pods: Api<Pod> = Api::namespaced(self.client.clone(), &event.namespace);
            match pods.get_opt(&event.resource_name).await {
                Ok(Some(pod)) => {
                    if let Some(labels) = pod.metadata.labels {
                        event.labels.extend(labels);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, pod = %event.resource_name, "label lookup failed"),
            }
        }
        Some(event)
    }
}
