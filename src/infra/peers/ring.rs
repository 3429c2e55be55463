//! Consistent-hash ring mapping cache keys to peers.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::xxh3_64;

/// Virtual points placed on the ring for each peer.
pub const DEFAULT_REPLICAS: usize = 64;

/// Consistent-hash ring over peer ids.
///
/// Each peer owns `replicas` points; a key belongs to the first point at or
/// after its hash, wrapping around. Adding or removing a peer only moves the
/// keys adjacent to that peer's points.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    points: BTreeMap<u64, String>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    /// Empty ring with `replicas` points per peer (at least one).
    #[must_use]
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            points: BTreeMap::new(),
        }
    }

    /// Add `peer` to the ring. Adding a present peer is a no-op.
    pub fn add(&mut self, peer: &str) {
        for i in 0..self.replicas {
            self.points
                .insert(xxh3_64(format!("{i}{peer}").as_bytes()), peer.to_string());
        }
    }

    /// Remove every point owned by `peer`.
    pub fn remove(&mut self, peer: &str) {
        self.points.retain(|_, owner| owner != peer);
    }

    /// Owner of `key`, or `None` for an empty ring.
    #[must_use]
    pub fn owner(&self, key: &str) -> Option<&str> {
        let hash = xxh3_64(key.as_bytes());
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, peer)| peer.as_str())
    }

    /// True when no peer is on the ring.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
