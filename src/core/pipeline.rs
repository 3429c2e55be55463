//! Running commands: full-buffer `run` and incremental `stream`.
//!
//! Both paths fetch raw tool output the same way. A command bound to a cache
//! group asks the group for the key of the current bucket; an unbound command
//! calls the group's getter directly. Streaming an uncached command parses
//! standard output while the tool is still running.

use std::time::SystemTime;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use super::command::Command;
use super::error::QueryError;
use super::executor::{execute_key, SpawnedProcess};
use crate::classad::ClassAd;

/// Lifecycle of a streamed query.
///
/// `Idle -> Started -> Streaming -> Completed`, with `Failed` reachable from
/// any state that is not terminal. States never move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, not yet running.
    Idle,
    /// Tool started or cache lookup issued.
    Started,
    /// Records are being parsed and delivered.
    Streaming,
    /// Every record was delivered and the tool exited successfully.
    Completed,
    /// The query failed; the cause was sent on the error channel.
    Failed,
}

impl PipelineState {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Started)
                | (Self::Started, Self::Streaming)
                | (Self::Streaming, Self::Completed)
                | (Self::Idle | Self::Started | Self::Streaming, Self::Failed)
        )
    }

    /// True for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

struct StateTracker {
    tx: watch::Sender<PipelineState>,
}

impl StateTracker {
    fn advance(&self, next: PipelineState) {
        let moved = self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if !moved {
            warn!(to = ?next, from = ?*self.tx.borrow(), "ignored invalid pipeline transition");
        }
    }
}

/// Receiving side of a streamed query.
#[derive(Debug)]
pub struct ClassAdStream {
    /// Records in output order. Closes when the query finishes.
    pub ads: mpsc::Receiver<ClassAd>,
    /// Parse, execution and cancellation errors. Closes together with `ads`.
    pub errors: mpsc::UnboundedReceiver<QueryError>,
    state: watch::Receiver<PipelineState>,
    task: JoinHandle<()>,
}

impl ClassAdStream {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    /// Next record, or `None` once the stream is finished.
    pub async fn next(&mut self) -> Option<ClassAd> {
        self.ads.recv().await
    }

    /// Drain the stream, returning every record and every error.
    pub async fn collect(mut self) -> (Vec<ClassAd>, Vec<QueryError>) {
        let mut ads = Vec::new();
        while let Some(ad) = self.ads.recv().await {
            ads.push(ad);
        }
        let mut errors = Vec::new();
        while let Some(err) = self.errors.recv().await {
            errors.push(err);
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "stream task did not finish cleanly");
        }
        (ads, errors)
    }
}

impl Command {
    /// Run the query and parse the complete output.
    ///
    /// # Errors
    ///
    /// Any execution, cache or parse error. Parsing aborts on the first
    /// malformed line.
    pub async fn run(&self) -> Result<Vec<ClassAd>, QueryError> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// [`Command::run`] with an explicit cancellation token. Cancelling kills
    /// the tool and returns [`QueryError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Same as [`Command::run`].
    pub async fn run_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ClassAd>, QueryError> {
        let span = info_span!(
            "run",
            component = "htcondor",
            db.instance = self.pool().unwrap_or_default(),
            db.statement = %self.statement(),
        );
        async {
            let bytes = self.fetch_raw_at(SystemTime::now(), cancel).await?;
            let ads = self.reader().parse_bytes(&bytes)?;
            debug!(records = ads.len(), bytes = bytes.len(), "query finished");
            Ok(ads)
        }
        .instrument(span)
        .await
    }

    /// Raw tool output for this command as of `now`.
    ///
    /// With a cache binding the result comes from the group (and is shared
    /// with every caller asking for the same bucket); otherwise the tool runs
    /// through this command's executor.
    ///
    /// # Errors
    ///
    /// Any execution or cache error.
    pub async fn fetch_raw_at(
        &self,
        now: SystemTime,
        cancel: CancellationToken,
    ) -> Result<Bytes, QueryError> {
        let key = self.cache_key_at(now);
        match self.cache() {
            Some(binding) => binding.group.get(&key, cancel).await,
            None => execute_key(self.executor().as_ref(), &key, cancel).await,
        }
    }

    /// Stream records as they are parsed. Must be called within a tokio
    /// runtime.
    #[must_use]
    pub fn stream(&self) -> ClassAdStream {
        self.stream_with_cancel(CancellationToken::new())
    }

    /// [`Command::stream`] with an explicit cancellation token.
    ///
    /// Malformed lines are reported on the error channel and skipped. A tool
    /// failure or cancellation is reported on the error channel and moves the
    /// stream to [`PipelineState::Failed`].
    #[must_use]
    pub fn stream_with_cancel(&self, cancel: CancellationToken) -> ClassAdStream {
        let (ads_tx, ads) = mpsc::channel(self.reader().channel_capacity());
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(PipelineState::Idle);
        let span = info_span!(
            "stream",
            component = "htcondor",
            db.instance = self.pool().unwrap_or_default(),
            db.statement = %self.statement(),
        );
        let command = self.clone();
        let tracker = StateTracker { tx: state_tx };
        let task = tokio::spawn(
            async move {
                tracker.advance(PipelineState::Started);
                let outcome = if command.cache().is_some() {
                    stream_cached(&command, &tracker, &ads_tx, &errors_tx, cancel).await
                } else {
                    stream_direct(&command, &tracker, &ads_tx, &errors_tx, cancel).await
                };
                match outcome {
                    Ok(()) => tracker.advance(PipelineState::Completed),
                    Err(e) => {
                        debug!(error = %e, "stream failed");
                        let _ = errors_tx.send(e);
                        tracker.advance(PipelineState::Failed);
                    }
                }
            }
            .instrument(span),
        );
        ClassAdStream {
            ads,
            errors,
            state,
            task,
        }
    }
}

async fn stream_cached(
    command: &Command,
    tracker: &StateTracker,
    ads: &mpsc::Sender<ClassAd>,
    errors: &mpsc::UnboundedSender<QueryError>,
    cancel: CancellationToken,
) -> Result<(), QueryError> {
    let bytes = command.fetch_raw_at(SystemTime::now(), cancel.clone()).await?;
    tracker.advance(PipelineState::Streaming);
    let reader = command.reader();
    let parse = reader.stream(&bytes[..], ads.clone(), errors.clone());
    tokio::select! {
        () = cancel.cancelled() => Err(QueryError::Cancelled),
        () = parse => Ok(()),
    }
}

async fn stream_direct(
    command: &Command,
    tracker: &StateTracker,
    ads: &mpsc::Sender<ClassAd>,
    errors: &mpsc::UnboundedSender<QueryError>,
    cancel: CancellationToken,
) -> Result<(), QueryError> {
    let process_cancel = cancel.child_token();
    let SpawnedProcess { stdout, completion } = command
        .executor()
        .spawn(command, process_cancel.clone())
        .await?;
    tracker.advance(PipelineState::Streaming);
    let reader = command.reader();
    let parse = async {
        reader
            .stream(BufReader::new(stdout), ads.clone(), errors.clone())
            .await;
        if ads.is_closed() {
            debug!("stream consumer went away, stopping tool");
            process_cancel.cancel();
        }
    };
    let ((), completion) = tokio::join!(parse, completion);
    completion
}
