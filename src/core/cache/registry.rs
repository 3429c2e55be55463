//! Registry of cache groups sharing an executor and a peer picker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use super::QueryCache;
use crate::core::error::QueryError;
use crate::core::executor::Executor;
use crate::core::peer::{NoPeers, PeerPicker};
use crate::infra::process::ProcessExecutor;

/// Owner of the cache groups of one process.
///
/// Groups are created once and then shared; registering an existing name
/// returns the group already registered under it.
pub struct CachePool {
    id: String,
    executor: Arc<dyn Executor>,
    peers: Arc<dyn PeerPicker>,
    groups: RwLock<HashMap<String, Arc<QueryCache>>>,
}

impl Default for CachePool {
    fn default() -> Self {
        Self::new(Arc::new(ProcessExecutor::default()), Arc::new(NoPeers))
    }
}

impl CachePool {
    /// Create an empty pool with a random peer id.
    pub fn new(executor: Arc<dyn Executor>, peers: Arc<dyn PeerPicker>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), executor, peers)
    }

    /// Create an empty pool identified as `id` among its peers.
    pub fn with_id(
        id: impl Into<String>,
        executor: Arc<dyn Executor>,
        peers: Arc<dyn PeerPicker>,
    ) -> Self {
        Self {
            id: id.into(),
            executor,
            peers,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Peer id of this process.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Executor shared by every group.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Create the group `name` with a byte budget, or return the existing
    /// group of that name unchanged.
    pub fn register_group(&self, name: &str, capacity_bytes: usize) -> Arc<QueryCache> {
        if let Some(group) = self.groups.read().get(name) {
            return Arc::clone(group);
        }
        let mut groups = self.groups.write();
        let group = groups.entry(name.to_string()).or_insert_with(|| {
            info!(pool = %self.id, group = name, capacity_bytes, "registered cache group");
            Arc::new(QueryCache::new(
                name,
                capacity_bytes,
                Arc::clone(&self.executor),
                Arc::clone(&self.peers),
            ))
        });
        Arc::clone(group)
    }

    /// Look up a registered group.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<Arc<QueryCache>> {
        self.groups.read().get(name).cloned()
    }

    /// Look up a registered group, failing when it is missing.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnknownGroup`] when no group of that name exists.
    pub fn require_group(&self, name: &str) -> Result<Arc<QueryCache>, QueryError> {
        self.group(name)
            .ok_or_else(|| QueryError::UnknownGroup(name.to_string()))
    }

    /// Names of all registered groups, sorted.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for CachePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePool")
            .field("id", &self.id)
            .field("groups", &self.groups())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let pool = CachePool::default();
        let a = pool.register_group("jobs", 1024);
        let b = pool.register_group("jobs", 4096);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.capacity_bytes(), 1024);
    }

    #[test]
    fn test_lookup() {
        let pool = CachePool::with_id(
            "peer-a",
            Arc::new(ProcessExecutor::default()),
            Arc::new(NoPeers),
        );
        pool.register_group("slots", 64);
        pool.register_group("history", 64);
        assert_eq!(pool.id(), "peer-a");
        assert_eq!(pool.groups(), ["history", "slots"]);
        assert!(pool.group("slots").is_some());
        assert!(matches!(
            pool.require_group("missing"),
            Err(QueryError::UnknownGroup(name)) if name == "missing"
        ));
    }
}
