//! Process execution boundary.
//!
//! Everything the crate knows about running a tool goes through [`Executor`].
//! The production implementation spawns local processes
//! ([`crate::infra::process::ProcessExecutor`]); tests substitute fakes.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use super::command::Command;
use super::error::QueryError;
use super::key::CacheKey;
use super::metrics::COMMAND_DURATION;

/// Captured result of a finished tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Everything the tool wrote to standard output.
    pub stdout: Bytes,
    /// Everything the tool wrote to standard error.
    pub stderr: Bytes,
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl Output {
    /// Output of a successful run.
    #[must_use]
    pub fn ok(stdout: impl Into<Bytes>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Bytes::new(),
            code: Some(0),
        }
    }

    /// True when the tool exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human-readable exit status.
    #[must_use]
    pub fn status(&self) -> String {
        self.code.map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit code {code}"),
        )
    }

    /// Standard output of a successful run.
    ///
    /// # Errors
    ///
    /// [`QueryError::Execution`] when the tool did not exit successfully. The
    /// error carries the standard error text and whatever standard output was
    /// produced.
    pub fn into_stdout(self, statement: &str) -> Result<Bytes, QueryError> {
        if self.success() {
            return Ok(self.stdout);
        }
        Err(QueryError::Execution {
            command: statement.to_string(),
            status: self.status(),
            stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            stdout: self.stdout,
        })
    }
}

/// A running tool whose standard output is consumed incrementally.
pub struct SpawnedProcess {
    /// Standard output pipe.
    pub stdout: Pin<Box<dyn AsyncRead + Send>>,
    /// Resolves when the process exits: `Ok` on success,
    /// [`QueryError::Execution`] on a non-zero exit and
    /// [`QueryError::Cancelled`] if the token fired first (the process is
    /// killed).
    pub completion: BoxFuture<'static, Result<(), QueryError>>,
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess").finish_non_exhaustive()
    }
}

/// Runs HTCondor tools on behalf of [`Command`]s.
///
/// Implementations must kill the underlying process when `cancel` fires.
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run `command` to completion and capture its output.
    ///
    /// A non-zero exit is not an error at this level; see
    /// [`Output::into_stdout`].
    async fn run(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<Output, QueryError>;

    /// Start `command` and hand back its standard output as it is produced.
    async fn spawn(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<SpawnedProcess, QueryError>;
}

/// Execute the command encoded in `key` and return its standard output.
///
/// Uncached runs and cache misses both come through here, so a cached result
/// is always byte-for-byte what a direct run would have returned.
pub(crate) async fn execute_key(
    executor: &dyn Executor,
    key: &CacheKey,
    cancel: CancellationToken,
) -> Result<Bytes, QueryError> {
    let decoded = key.decode()?;
    let statement = decoded.command.statement();
    let span = info_span!(
        "getter",
        component = "htcondor",
        db.system = "htcondor",
        db.statement = %statement,
        bucket = %decoded.bucket,
    );
    async move {
        let _timer = COMMAND_DURATION
            .with_label_values(&[decoded.command.tool()])
            .start_timer();
        let output = executor.run(&decoded.command, cancel).await?;
        debug!(code = ?output.code, stdout_bytes = output.stdout.len(), "tool exited");
        output.into_stdout(&statement)
    }
    .instrument(span)
    .await
}
