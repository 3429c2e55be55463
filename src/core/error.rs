//! Error types for query operations.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::classad::ParseError;

/// Errors produced while building, executing, caching or parsing a query.
///
/// `Clone` so one failed execution can be handed to every caller that was
/// coalesced onto it; I/O errors are shared behind an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Malformed or oversized line in tool output.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The tool could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Command line that was being started.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The tool ran but did not exit successfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Execution {
        /// Command line that was run.
        command: String,
        /// Human-readable exit status, e.g. `exit code 1`.
        status: String,
        /// Captured standard error text.
        stderr: String,
        /// Standard output captured before the failure, kept for diagnostics.
        stdout: Bytes,
    },
    /// A cache key could not be turned back into a command.
    #[error("unable to decode cache key {key:?}: {reason}")]
    CacheDecode {
        /// The raw key.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Pipe or read failure independent of the tool's exit status.
    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),
    /// The query's cancellation token fired.
    #[error("query cancelled")]
    Cancelled,
    /// No cache group with this name is registered.
    #[error("cache group `{0}` is not registered")]
    UnknownGroup(String),
    /// A peer could not serve a cache request.
    #[error("peer error: {0}")]
    Peer(String),
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<io::Error> for QueryError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl QueryError {
    /// Build a decode error for `key`.
    pub fn decode(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheDecode {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for [`QueryError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
