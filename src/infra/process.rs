//! Local process executor built on `tokio::process`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as ProcessCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::command::Command;
use crate::core::error::QueryError;
use crate::core::executor::{Executor, Output, SpawnedProcess};

/// Runs tools as child processes of the current process.
///
/// Children are killed when their handle is dropped or their cancellation
/// token fires, so an abandoned query never leaves a tool running.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    bin_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    /// Executor resolving tools through `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve tools inside `bin_dir` instead of through `PATH`.
    #[must_use]
    pub fn with_bin_dir(mut self, bin_dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(bin_dir.into());
        self
    }

    /// Directory tools are resolved in, if set.
    #[must_use]
    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    fn program(&self, tool: &str) -> PathBuf {
        self.bin_dir
            .as_ref()
            .map_or_else(|| PathBuf::from(tool), |dir| dir.join(tool))
    }

    /// Ready-to-run process for `command`: the tool resolved against
    /// [`ProcessExecutor::bin_dir`] with the rendered argument list.
    ///
    /// Nothing is spawned and no stdio is configured, so callers can run the
    /// tool themselves and handle its output directly.
    ///
    /// ```
    /// use htcondor_query::infra::ProcessExecutor;
    /// use htcondor_query::Command;
    ///
    /// let query = Command::new("condor_q").with_arg("-allusers");
    /// let process = ProcessExecutor::new()
    ///     .with_bin_dir("/usr/bin")
    ///     .process_command(&query);
    /// assert_eq!(process.as_std().get_program(), "/usr/bin/condor_q");
    /// ```
    #[must_use]
    pub fn process_command(&self, command: &Command) -> ProcessCommand {
        let mut process = ProcessCommand::new(self.program(command.tool()));
        process.args(command.make_args());
        process
    }

    fn start(&self, command: &Command) -> Result<Child, QueryError> {
        let mut process = self.process_command(command);
        debug!(
            program = ?process.as_std().get_program(),
            args = ?command.make_args(),
            "spawning tool"
        );
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QueryError::Spawn {
                command: command.statement(),
                source: e.into(),
            })
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn kill(child: &mut Child, statement: &str) {
    if let Err(e) = child.kill().await {
        warn!(command = %statement, error = %e, "failed to kill cancelled tool");
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<Output, QueryError> {
        let statement = command.statement();
        let mut child = self.start(command)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async {
            let (stdout, stderr) = tokio::try_join!(read_pipe(stdout), read_pipe(stderr))?;
            let status = child.wait().await?;
            Ok::<_, io::Error>((stdout, stderr, status))
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = collect => Some(result),
        };
        let Some(result) = result else {
            kill(&mut child, &statement).await;
            debug!(command = %statement, "tool cancelled");
            return Err(QueryError::Cancelled);
        };
        let (stdout, stderr, status) = result?;
        Ok(Output {
            stdout: Bytes::from(stdout),
            stderr: Bytes::from(stderr),
            code: status.code(),
        })
    }

    async fn spawn(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<SpawnedProcess, QueryError> {
        let statement = command.statement();
        let mut child = self.start(command)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let completion = async move {
            let status: ExitStatus = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    kill(&mut child, &statement).await;
                    stderr.abort();
                    return Err(QueryError::Cancelled);
                }
                status = child.wait() => status?,
            };
            let stderr = match stderr.await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(QueryError::Io(Arc::new(io::Error::other(e)))),
            };
            Output {
                stdout: Bytes::new(),
                stderr: Bytes::from(stderr),
                code: status.code(),
            }
            .into_stdout(&statement)
            .map(|_| ())
        }
        .boxed();

        Ok(SpawnedProcess {
            stdout: Box::pin(stdout),
            completion,
        })
    }
}
