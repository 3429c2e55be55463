//! In-process peer mesh.
//!
//! Every [`CachePool`] that joins a [`PeerMesh`] takes a share of the key
//! space on a consistent-hash ring. A pool's [`MeshPicker`] routes keys it
//! does not own to the owning pool's group of the same name. Pools are held
//! weakly, so dropping a pool removes it from routing even without `leave`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ring::HashRing;
use crate::core::cache::CachePool;
use crate::core::error::QueryError;
use crate::core::key::CacheKey;
use crate::core::peer::{PeerGetter, PeerPicker};

#[derive(Debug, Default)]
struct MeshState {
    ring: HashRing,
    members: HashMap<String, Weak<CachePool>>,
}

/// Shared membership of cooperating cache pools.
///
/// ```
/// use std::sync::Arc;
/// use htcondor_query::core::CachePool;
/// use htcondor_query::infra::{PeerMesh, ProcessExecutor};
///
/// let mesh = PeerMesh::new();
/// let executor = Arc::new(ProcessExecutor::default());
/// let a = Arc::new(CachePool::with_id("a", executor.clone(), Arc::new(mesh.picker("a"))));
/// let b = Arc::new(CachePool::with_id("b", executor, Arc::new(mesh.picker("b"))));
/// mesh.join(&a);
/// mesh.join(&b);
/// assert_eq!(mesh.members(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PeerMesh {
    state: Arc<RwLock<MeshState>>,
}

impl PeerMesh {
    /// Empty mesh using the default number of ring replicas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty mesh with `replicas` ring points per member.
    #[must_use]
    pub fn with_replicas(replicas: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MeshState {
                ring: HashRing::new(replicas),
                members: HashMap::new(),
            })),
        }
    }

    /// Add `pool` under its id. Re-joining replaces the previous handle.
    pub fn join(&self, pool: &Arc<CachePool>) {
        let mut state = self.state.write();
        let id = pool.id().to_string();
        if state.members.insert(id.clone(), Arc::downgrade(pool)).is_none() {
            state.ring.add(&id);
        }
        info!(peer = %id, members = state.members.len(), "peer joined mesh");
    }

    /// Remove the member `id`; its keys move to the remaining members.
    pub fn leave(&self, id: &str) {
        let mut state = self.state.write();
        if state.members.remove(id).is_some() {
            state.ring.remove(id);
            info!(peer = %id, members = state.members.len(), "peer left mesh");
        }
    }

    /// Ids of current members, sorted.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.read().members.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Id of the member owning `key`.
    #[must_use]
    pub fn owner_of(&self, key: &CacheKey) -> Option<String> {
        self.state.read().ring.owner(key.as_str()).map(str::to_string)
    }

    /// Picker for the member `self_id`. It returns `None` for keys that
    /// member owns, and for keys whose owner is no longer alive.
    #[must_use]
    pub fn picker(&self, self_id: impl Into<String>) -> MeshPicker {
        MeshPicker {
            self_id: self_id.into(),
            mesh: self.clone(),
        }
    }
}

/// [`PeerPicker`] view of a [`PeerMesh`] from one member.
#[derive(Debug, Clone)]
pub struct MeshPicker {
    self_id: String,
    mesh: PeerMesh,
}

impl PeerPicker for MeshPicker {
    fn pick_peer(&self, key: &CacheKey) -> Option<Arc<dyn PeerGetter>> {
        let state = self.mesh.state.read();
        let owner = state.ring.owner(key.as_str())?;
        if owner == self.self_id {
            return None;
        }
        let pool = state.members.get(owner)?.upgrade()?;
        debug!(from = %self.self_id, to = %owner, "routing key to owning peer");
        Some(Arc::new(PoolPeer { pool }))
    }
}

struct PoolPeer {
    pool: Arc<CachePool>,
}

#[async_trait]
impl PeerGetter for PoolPeer {
    async fn get(
        &self,
        group: &str,
        key: &CacheKey,
        cancel: CancellationToken,
    ) -> Result<Bytes, QueryError> {
        let group = self
            .pool
            .require_group(group)
            .map_err(|e| QueryError::Peer(format!("{}: {e}", self.pool.id())))?;
        group.get(key, cancel).await
    }
}
