use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use remedy_cluster::ClusterClient;
use remedy_core::ClusterId;

/// Cluster clients keyed by cluster id. Clients can be added and removed
/// while the engine runs.
#[derive(Default)]
pub struct ClusterRegistry {
    clients: RwLock<HashMap<ClusterId, Arc<dyn ClusterClient>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any previous one for the same id.
    pub fn register(&self, id: ClusterId, client: Arc<dyn ClusterClient>) {
        self.clients.write().insert(id, client);
    }

    /// Returns `true` if a client was registered for `id`.
    pub fn unregister(&self, id: &ClusterId) -> bool {
        self.clients.write().remove(id).is_some()
    }

    pub fn get(&self, id: &ClusterId) -> Option<Arc<dyn ClusterClient>> {
        self.clients.read().get(id).cloned()
    }

    /// Registered cluster ids, sorted.
    pub fn ids(&self) -> Vec<ClusterId> {
        let mut ids: Vec<_> = self.clients.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for ClusterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRegistry")
            .field("clusters", &self.ids())
            .finish()
    }
}
