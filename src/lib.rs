//! # HTCondor Query
//!
//! A client-side query layer for HTCondor pools.
//!
//! The HTCondor inspection tools (`condor_q`, `condor_status`,
//! `condor_history`, ...) print their results as ClassAds: records of
//! `Name = Value` lines separated by blank lines. This crate builds those
//! invocations, runs them, decodes their output into typed attributes, and
//! optionally caches the raw output so identical, expensive queries run once
//! per time bucket, even across a set of cooperating processes.
//!
//! ## Key Features
//!
//! - **Immutable commands**: [`Command`] is a value; builders consume and
//!   return it, so a shared base query can be specialized freely.
//! - **Batch and streaming parsing**: parse a whole response at once, or get
//!   records over a bounded channel while the tool is still running.
//! - **Time-bucketed cache keys**: keys embed the start of the current
//!   bucket, so a cached result is never served after its bucket ends.
//! - **Single-flight loading**: concurrent misses for a key share one
//!   execution; with a peer mesh, only the key's owner runs the tool.
//! - **Cancellation**: every query accepts a `CancellationToken` that kills
//!   the underlying process.
//!
//! ## Running a query
//!
//! ```rust,no_run
//! use htcondor_query::Command;
//!
//! # async fn demo() -> Result<(), htcondor_query::QueryError> {
//! let ads = Command::new("condor_status")
//!     .with_pool("cm.example.org:9618")
//!     .with_constraint("State == \"Unclaimed\"")
//!     .with_attribute("Name")
//!     .with_attribute("Cpus")
//!     .run()
//!     .await?;
//! for ad in &ads {
//!     println!("{:?} {:?}", ad.get("Name"), ad.get("Cpus"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Caching
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use htcondor_query::{CachePool, Command};
//!
//! # async fn demo() -> Result<(), htcondor_query::QueryError> {
//! let pool = CachePool::default();
//! let jobs = pool.register_group("jobs", 64 << 20);
//! let query = Command::new("condor_q")
//!     .with_arg("-allusers")
//!     .with_cache(Arc::clone(&jobs), Duration::from_secs(60));
//!
//! // Every call in the same minute shares one execution.
//! let first = query.run().await?;
//! let second = query.run().await?;
//! assert_eq!(first, second);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// ClassAd records, attribute values and the long-format parser.
pub mod classad;
/// Commands, cache keys, the query cache and the execution boundary.
pub mod core;
/// Configuration models for the client and its cache groups.
pub mod config;
/// Builders to construct cache components from configuration.
pub mod builders;
/// Infrastructure adapters: process execution and peer routing.
pub mod infra;
/// Shared utilities.
pub mod util;

pub use crate::classad::{Attribute, AttributeKind, ClassAd, ClassAdReader, ParseError};
pub use crate::core::{
    CacheKey, CachePool, ClassAdStream, Command, PipelineState, QueryCache, QueryError,
};
