//! Kubernetes backend for the remediation engine: a [`ClusterClient`]
//! implementation on top of `kube`, and a watcher that turns core/v1 Events
//! into [`RemediationEvent`]s.
//!
//! [`ClusterClient`]: remedy_cluster::ClusterClient
//! [`RemediationEvent`]: remedy_core::RemediationEvent

mod client;
mod convert;
mod watcher;

pub use client::KubeClusterClient;
pub use convert::{event_from_kube, node_info, pod_info};
pub use watcher::{EventWatcher, EventWatcherConfig};
