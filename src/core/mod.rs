//! Query descriptors, cache keys, the cache itself and the execution boundary.

pub mod cache;
pub mod command;
pub mod error;
pub mod executor;
pub mod key;
pub mod metrics;
pub mod peer;
pub mod pipeline;

pub use cache::{CachePool, CacheStats, QueryCache};
pub use command::{CacheBinding, Command};
pub use error::{AppResult, QueryError};
pub use executor::{Executor, Output, SpawnedProcess};
pub use key::{CacheKey, DecodedKey, KEY_SEPARATOR, NO_EXPIRY};
pub use metrics::COMMAND_DURATION;
pub use peer::{NoPeers, PeerGetter, PeerPicker};
pub use pipeline::{ClassAdStream, PipelineState};
