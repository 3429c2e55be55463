//! Builders to construct cache pools and cached commands from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::ClientConfig;
use crate::core::{CachePool, Command, Executor, PeerPicker, QueryError};

/// Build a cache pool with every group named in `cfg`.
///
/// The pool takes its id from `cache.peer_id` when set. Without a cache
/// section the pool is returned empty.
///
/// # Errors
///
/// [`QueryError::Config`] when `cfg` does not validate.
pub fn build_cache_pool(
    cfg: &ClientConfig,
    executor: Arc<dyn Executor>,
    peers: Arc<dyn PeerPicker>,
) -> Result<CachePool, QueryError> {
    cfg.validate()
        .map_err(|e| QueryError::Config(format!("config invalid: {e}")))?;

    let pool = match cfg.cache.as_ref().and_then(|c| c.peer_id.clone()) {
        Some(id) => CachePool::with_id(id, executor, peers),
        None => CachePool::new(executor, peers),
    };
    if let Some(cache) = &cfg.cache {
        for (name, group) in &cache.groups {
            pool.register_group(name, group.capacity_bytes);
        }
    }
    info!(pool = %pool.id(), groups = ?pool.groups(), "built cache pool");
    Ok(pool)
}

/// New command for `tool` bound to the group `group` of `pool`, with the
/// group's configured lifetime.
///
/// # Errors
///
/// [`QueryError::UnknownGroup`] when the group is not configured or not
/// registered in `pool`.
pub fn cached_command(
    cfg: &ClientConfig,
    pool: &CachePool,
    group: &str,
    tool: impl Into<String>,
) -> Result<Command, QueryError> {
    let settings = cfg
        .group(group)
        .ok_or_else(|| QueryError::UnknownGroup(group.to_string()))?;
    let cache = pool.require_group(group)?;
    Ok(cfg.command(tool).with_cache(cache, settings.lifetime()))
}
