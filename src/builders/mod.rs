//! Builders to construct cache components from configuration.

pub mod cache_builder;

pub use cache_builder::{build_cache_pool, cached_command};
