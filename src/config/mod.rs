//! Configuration models for the client and its cache groups.

pub mod client;

pub use client::{CacheConfig, ClientConfig, GroupConfig};
