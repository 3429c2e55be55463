//! Prometheus metrics for tool executions.
//!
//! Metrics are created lazily and never registered by this crate. Register
//! them with whatever registry the application exports:
//!
//! ```
//! let registry = prometheus::Registry::new();
//! htcondor_query::core::metrics::register(&registry).unwrap();
//! ```

use std::sync::LazyLock;

use prometheus::{HistogramOpts, HistogramVec, Registry};

/// Name of [`COMMAND_DURATION`].
pub const COMMAND_DURATION_NAME: &str = "htcondor_client_command_duration_seconds";

/// Duration of every tool run, labelled by tool name (`command`).
///
/// Observed around each execution of a cache getter, which covers uncached
/// runs and cache misses. Cache hits and coalesced callers are not timed.
pub static COMMAND_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(COMMAND_DURATION_NAME, "Histogram of command runtimes."),
        &["command"],
    )
    .expect("command duration histogram definition is valid")
});

/// Register every metric of this crate with `registry`.
///
/// # Errors
///
/// Fails when a metric with the same name is already registered.
pub fn register(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(COMMAND_DURATION.clone()))
}
