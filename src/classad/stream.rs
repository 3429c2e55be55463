//! Streaming delivery of ClassAds over bounded channels.
//!
//! Records go out on a bounded channel as soon as they close, so a slow
//! consumer throttles the parser instead of letting undelivered records pile up
//! in memory. Parse errors go out on a separate unbounded channel and do not
//! stop the stream; a read failure is reported and ends it. Both channels close
//! when the producer returns.

use std::io::{BufRead, BufReader, Read};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::reader::{next_line, AdBuilder, Line, LineScanner};
use super::{ClassAd, ClassAdReader};
use crate::core::QueryError;

impl ClassAdReader {
    /// Parse `reader` asynchronously, sending each record as it closes.
    ///
    /// Returns once input is exhausted, the reader fails, or the record
    /// receiver is dropped. The senders are consumed, so both channels close
    /// when this future completes.
    pub async fn stream<R>(
        &self,
        mut reader: R,
        ads: mpsc::Sender<ClassAd>,
        errors: mpsc::UnboundedSender<QueryError>,
    ) where
        R: AsyncBufRead + Unpin,
    {
        let mut scanner = LineScanner::new(self.max_line_bytes());
        let mut builder = AdBuilder::default();
        loop {
            match next_line_async(&mut reader, &mut scanner).await {
                Ok(Some(line)) => match builder.push(line) {
                    Ok(Some(ad)) => {
                        if ads.send(ad).await.is_err() {
                            debug!("classad receiver dropped, stopping stream");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = errors.send(e.into());
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    let _ = errors.send(e.into());
                    return;
                }
            }
        }
        if let Some(ad) = builder.finish() {
            let _ = ads.send(ad).await;
        }
    }

    /// Blocking counterpart of [`ClassAdReader::stream`] over crossbeam
    /// channels, for callers outside an async runtime.
    pub fn stream_blocking<R: BufRead>(
        &self,
        mut reader: R,
        ads: Sender<ClassAd>,
        errors: Sender<QueryError>,
    ) {
        let mut scanner = LineScanner::new(self.max_line_bytes());
        let mut builder = AdBuilder::default();
        loop {
            match next_line(&mut reader, &mut scanner) {
                Ok(Some(line)) => match builder.push(line) {
                    Ok(Some(ad)) => {
                        if ads.send(ad).is_err() {
                            debug!("classad receiver dropped, stopping stream");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = errors.send(e.into());
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    let _ = errors.send(e.into());
                    return;
                }
            }
        }
        if let Some(ad) = builder.finish() {
            let _ = ads.send(ad);
        }
    }

    /// Run [`ClassAdReader::stream_blocking`] on a dedicated thread.
    #[must_use]
    pub fn spawn_blocking_stream<R>(&self, reader: R) -> BlockingClassAdStream
    where
        R: Read + Send + 'static,
    {
        let (ads_tx, ads) = bounded(self.channel_capacity());
        let (errors_tx, errors) = unbounded();
        let parser = *self;
        let handle = thread::spawn(move || {
            parser.stream_blocking(BufReader::new(reader), ads_tx, errors_tx);
        });
        BlockingClassAdStream {
            ads,
            errors,
            handle: Some(handle),
        }
    }
}

/// Receiving half of a blocking ClassAd stream.
#[derive(Debug)]
pub struct BlockingClassAdStream {
    /// Records in parse order. Disconnects when the parser finishes.
    pub ads: Receiver<ClassAd>,
    /// Parse and read errors. Disconnects together with `ads`.
    pub errors: Receiver<QueryError>,
    handle: Option<JoinHandle<()>>,
}

impl BlockingClassAdStream {
    /// Drain both channels, returning every record and every error.
    #[must_use]
    pub fn collect(mut self) -> (Vec<ClassAd>, Vec<QueryError>) {
        let ads: Vec<ClassAd> = self.ads.iter().collect();
        let errors: Vec<QueryError> = self.errors.iter().collect();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("classad parser thread panicked");
            }
        }
        (ads, errors)
    }
}

async fn next_line_async<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    scanner: &mut LineScanner,
) -> std::io::Result<Option<Line>> {
    loop {
        let (used, complete) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(scanner.take());
            }
            scanner.feed(available)
        };
        reader.consume(used);
        if complete {
            return Ok(scanner.take());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classad::Attribute;
    use std::io::Cursor;

    const GOOD: &str = "a = 1\nb = \"x\"\n\na = 2\n";
    const BAD: &str = "a = 1\nnonsense\nb = 2\n\nc = 3\n";

    #[tokio::test]
    async fn test_async_stream_good() {
        let (tx, mut rx) = mpsc::channel(1);
        let (etx, mut erx) = mpsc::unbounded_channel();
        let parser = ClassAdReader::new();
        let producer = tokio::spawn(async move { parser.stream(GOOD.as_bytes(), tx, etx).await });

        let mut ads = Vec::new();
        while let Some(ad) = rx.recv().await {
            ads.push(ad);
        }
        producer.await.unwrap();
        assert_eq!(ads.len(), 2);
        assert!(erx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_async_stream_continues_after_parse_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let (etx, mut erx) = mpsc::unbounded_channel();
        ClassAdReader::new().stream(BAD.as_bytes(), tx, etx).await;

        let mut ads = Vec::new();
        while let Some(ad) = rx.recv().await {
            ads.push(ad);
        }
        let mut errors = Vec::new();
        while let Some(err) = erx.recv().await {
            errors.push(err);
        }
        assert_eq!(ads.len(), 2);
        assert_eq!(ads[0].len(), 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_blocking_stream_backpressure_preserves_order() {
        let input: String = (0..50).map(|i| format!("Id = {i}\n\n")).collect();
        let stream = ClassAdReader::new()
            .with_channel_capacity(1)
            .spawn_blocking_stream(Cursor::new(input.into_bytes()));
        let (ads, errors) = stream.collect();
        assert!(errors.is_empty());
        let ids: Vec<i64> = ads
            .iter()
            .filter_map(|ad| ad.get("Id").and_then(Attribute::as_i64))
            .collect();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_blocking_stream_stops_when_receiver_dropped() {
        let input: String = (0..1000).map(|i| format!("Id = {i}\n\n")).collect();
        let mut stream = ClassAdReader::new()
            .with_channel_capacity(1)
            .spawn_blocking_stream(Cursor::new(input.into_bytes()));
        let first = stream.ads.recv().unwrap();
        assert!(first.contains("Id"));
        let (_, dropped) = crossbeam_channel::unbounded();
        drop(std::mem::replace(&mut stream.ads, dropped));
        if let Some(handle) = stream.handle.take() {
            handle.join().unwrap();
        }
    }
}
