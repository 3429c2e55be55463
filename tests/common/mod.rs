//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use htcondor_query::core::{Executor, Output, SpawnedProcess};
use htcondor_query::{Command, QueryError};
use tokio_util::sync::CancellationToken;

/// Executor that answers every command with one ClassAd describing the
/// invocation, after an optional delay.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    pub runs: AtomicU64,
    pub delay: Duration,
    /// Number of upcoming runs that exit with status 1.
    pub failures: AtomicUsize,
}

impl FakeExecutor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn failing(delay: Duration, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failures: AtomicUsize::new(failures),
            ..Self::default()
        })
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    fn render(command: &Command, run: u64) -> String {
        format!(
            "Tool = \"{}\"\nArgs = \"{}\"\nRun = {run}\n",
            command.tool(),
            command.make_args().join(" ")
        )
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<Output, QueryError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::select! {
            () = cancel.cancelled() => return Err(QueryError::Cancelled),
            () = tokio::time::sleep(self.delay) => {}
        }
        if self.take_failure() {
            return Ok(Output {
                stdout: Bytes::new(),
                stderr: Bytes::from_static(b"schedd unreachable\n"),
                code: Some(1),
            });
        }
        Ok(Output::ok(Self::render(command, run)))
    }

    async fn spawn(
        &self,
        command: &Command,
        cancel: CancellationToken,
    ) -> Result<SpawnedProcess, QueryError> {
        let output = self.run(command, cancel).await?;
        let statement = command.statement();
        let stdout = std::io::Cursor::new(output.stdout.to_vec());
        Ok(SpawnedProcess {
            stdout: Box::pin(stdout),
            completion: Box::pin(async move { output.into_stdout(&statement).map(|_| ()) }),
        })
    }
}
