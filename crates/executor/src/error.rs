use std::time::Duration;

use thiserror::Error;

use remedy_cluster::ClusterError;
use remedy_notify::NotifyError;

/// Why a single step attempt failed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The step cannot act on the resolved resource kind.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The step's target could not be resolved from the event.
    #[error("no target resource for {0} step")]
    MissingTarget(&'static str),

    /// The step needs a cluster client and none is registered.
    #[error("no cluster client registered for cluster {0}")]
    NoClusterClient(String),

    #[error("step timed out after {0:?}")]
    Timeout(Duration),
}
