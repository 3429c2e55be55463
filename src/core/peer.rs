//! Seam between a cache group and the peers that share its key space.
//!
//! The transport between processes is not part of this crate. A deployment
//! supplies a [`PeerPicker`] that maps each key to its owning peer; the
//! in-process [`crate::infra::peers::PeerMesh`] is provided for tests and
//! single-host setups.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::error::QueryError;
use super::key::CacheKey;

/// Fetches a key from a remote peer's cache group.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Ask the peer to load `key` in `group`. The peer runs its own
    /// single-flight and cache logic.
    async fn get(
        &self,
        group: &str,
        key: &CacheKey,
        cancel: CancellationToken,
    ) -> Result<Bytes, QueryError>;
}

/// Chooses which peer owns a key.
pub trait PeerPicker: Send + Sync {
    /// The remote owner of `key`, or `None` when the local process owns it.
    fn pick_peer(&self, key: &CacheKey) -> Option<Arc<dyn PeerGetter>>;
}

/// Picker for a process that owns every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &CacheKey) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}
