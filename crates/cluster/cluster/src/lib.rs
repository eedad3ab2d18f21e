pub mod client;
pub mod error;
pub mod recording;

pub use client::{ClusterClient, NodeInfo, PodInfo};
pub use error::ClusterError;
pub use recording::{ClusterCall, RecordingClusterClient};
